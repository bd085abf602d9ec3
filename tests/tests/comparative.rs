use std::{collections::HashSet, panic::AssertUnwindSafe, sync::Arc};

use futures::{future::LocalBoxFuture, FutureExt};
use threadline_client::{
    api::{self, ItemId, UserId},
    Discussion, DiscussionConfig, Node, NodePath,
};
use threadline_mock_server::{MockGateway, MockServer};
use tokio::sync::Mutex;

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            if std::env::var("RUST_LOG").is_ok() {
                let _ = tracing_subscriber::fmt::try_init();
            }
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

fn me() -> UserId {
    UserId(api::uuid!("44444444-4444-4444-4444-444444444444"))
}

fn initial_tree() -> Vec<api::Node> {
    let mut mine = api::Node::now(me(), String::from("mine"));
    let mut reply = api::Node::now(UserId::stub(), String::from("someone's reply"));
    reply
        .children
        .push(api::Node::now(me(), String::from("my sub-reply")));
    mine.children.push(reply);
    mine.children.push(api::Node::now(me(), String::from("my reply")));
    let theirs = api::Node::now(UserId::stub(), String::from("theirs"));
    vec![mine, theirs]
}

fn all_paths(tree: &[Node]) -> Vec<NodePath> {
    let mut res = Vec::new();
    for c in tree {
        res.push(NodePath::comment(c.id));
        for r in c.children.iter() {
            res.push(NodePath::reply(c.id, r.id));
            for s in r.children.iter() {
                res.push(NodePath::sub_reply(c.id, r.id, s.id));
            }
        }
    }
    res
}

fn inject(server: &mut MockServer, fault: u8) {
    match fault % 8 {
        0 => server.test_set_offline(true),
        1 => server.test_set_malformed_likes(true),
        2 => server.test_set_omit_actor_from_likes(true),
        _ => (),
    }
}

/// Operations a single batch dispatches at most
const MAX_BATCH: usize = 12;

/// One batch: a fault affecting the whole batch, then operations as
/// `(kind, target, rejected, answer delay)`
type Batch = (u8, Vec<(u8, u8, u8, u8)>);

do_tokio_test!(
    settled_client_matches_server,
    Vec<Batch>,
    |batches: Vec<Batch>| async move {
        let server = Arc::new(Mutex::new(MockServer::new()));
        server
            .lock()
            .await
            .test_set_tree(ItemId::stub(), initial_tree());
        let d = Discussion::new(
            DiscussionConfig {
                item: ItemId::stub(),
                user: me(),
            },
            MockGateway::new(server.clone(), me()),
        );
        d.mount().await.expect("mounting");

        for (b, (fault, mut ops)) in batches.into_iter().enumerate() {
            ops.truncate(MAX_BATCH);
            {
                let mut server = server.lock().await;
                inject(&mut server, fault);
                for (_, _, rejected, _) in ops.iter() {
                    if rejected % 4 == 0 {
                        server.test_reject_next(api::Error::Unknown(String::from("injected")));
                    }
                }
                server.test_delay_answers(ops.iter().map(|op| usize::from(op.3 % 5)));
            }

            // Everything is applied locally, then sent in dispatch order. Answers come
            // back in the order the delays give them. Each sibling list gets at most
            // one creation or deletion per batch: exact sibling positions only survive
            // rollbacks that undo a list newest-first.
            let mut reshaped = HashSet::new();
            let mut settling: Vec<LocalBoxFuture<'_, ()>> = Vec::new();
            for (i, (op, pick, _, _)) in ops.into_iter().enumerate() {
                let paths = all_paths(&d.snapshot());
                let path = paths.get(pick as usize % paths.len().max(1)).cloned();
                let text = format!(" text {b}.{i} ");

                match (op % 6, path) {
                    (0, _) => {
                        if reshaped.insert(None) {
                            if let Ok(Some(fut)) = d.create_comment(&text) {
                                settling.push(fut.map(drop).boxed_local());
                            }
                        }
                    }
                    (1, Some(p)) => {
                        if reshaped.insert(Some(p.clone())) {
                            if let Ok(Some(fut)) = d.create_reply(&p, &text) {
                                settling.push(fut.map(drop).boxed_local());
                            }
                        }
                    }
                    (2, Some(p)) => {
                        if let Ok(Some(fut)) = d.edit(&p, &text) {
                            settling.push(fut.map(drop).boxed_local());
                        }
                    }
                    (3, Some(p)) => {
                        if reshaped.insert(p.parent()) {
                            if let Ok(fut) = d.delete(&p) {
                                settling.push(fut.map(drop).boxed_local());
                            }
                        }
                    }
                    (4, Some(p)) => {
                        if let Ok(Some(fut)) = d.toggle_like(&p) {
                            let fut = fut.map(|res| {
                                res.expect("settling like");
                            });
                            settling.push(fut.boxed_local());
                        }
                    }
                    _ => {
                        assert!(matches!(d.create_comment(" \t"), Ok(None)));
                    }
                }
            }
            futures::future::join_all(settling).await;

            let mut server = server.lock().await;
            server.test_clear_faults();
            let expected = server
                .test_tree(ItemId::stub())
                .iter()
                .cloned()
                .map(Node::from)
                .collect::<Vec<_>>();
            assert_eq!(*d.snapshot(), expected);
            assert_eq!(
                d.count_all(),
                expected.iter().map(|n| n.count()).sum::<usize>()
            );
        }
    }
);
