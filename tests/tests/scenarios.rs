use std::sync::Arc;

use threadline_client::{
    api::{self, ItemId, UserId},
    Discussion, DiscussionConfig, LikeSettlement, NodeId, NodePath, Settlement,
};
use threadline_mock_server::{MockGateway, MockServer};
use tokio::sync::Mutex;

fn init_logs() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt::try_init();
    }
}

fn user() -> UserId {
    UserId(api::uuid!("33333333-3333-3333-3333-333333333333"))
}

async fn open(tree: Vec<api::Node>) -> Discussion<MockGateway> {
    init_logs();
    let mut server = MockServer::new();
    server.test_set_tree(ItemId::stub(), tree);
    let gateway = MockGateway::new(Arc::new(Mutex::new(server)), user());
    let d = Discussion::new(
        DiscussionConfig {
            item: ItemId::stub(),
            user: user(),
        },
        gateway,
    );
    d.mount().await.expect("mounting discussion");
    d
}

async fn with_server(d: &Discussion<MockGateway>, f: impl FnOnce(&mut MockServer)) {
    f(&mut *d.gateway().server().lock().await)
}

fn node(text: &str) -> api::Node {
    api::Node::now(user(), String::from(text))
}

#[tokio::test]
async fn failed_reply_leaves_no_trace() {
    let c1 = node("C1");
    let d = open(vec![c1.clone()]).await;
    let before = d.snapshot();

    with_server(&d, |s| s.test_set_offline(true)).await;
    let fut = d
        .create_reply(&NodePath::comment(c1.id), "R1")
        .expect("creating reply")
        .expect("dispatching reply");
    assert_eq!(d.snapshot()[0].children.len(), 1);
    assert_eq!(fut.await, Settlement::RolledBack);

    assert_eq!(d.snapshot()[0].children.len(), 0);
    assert_eq!(d.snapshot(), before);
}

#[tokio::test]
async fn reply_paging_is_capped() {
    let mut c2 = node("C2");
    c2.children = (0..10).map(|i| node(&format!("reply {i}"))).collect();
    let d = open(vec![c2.clone()]).await;
    let c2 = NodeId::from(c2.id);

    assert_eq!(d.revealed_replies(&c2), 0);
    assert_eq!(d.reveal_replies(c2), 4);
    assert_eq!(d.show_more_replies(c2), 8);
    assert_eq!(d.show_more_replies(c2), 10);
    d.hide_replies(&c2);
    assert_eq!(d.revealed_replies(&c2), 0);
}

#[tokio::test]
async fn sub_reply_like_round_trip() {
    let sr1 = node("SR1");
    let mut r2 = node("R2");
    r2.children.push(sr1.clone());
    let mut c3 = node("C3");
    c3.children.push(r2.clone());
    let d = open(vec![c3.clone()]).await;
    let path = NodePath::sub_reply(c3.id, r2.id, sr1.id);

    for expected in [vec![user()], vec![]] {
        let fut = d
            .toggle_like(&path)
            .expect("toggling like")
            .expect("dispatching like");
        assert_eq!(fut.await.expect("settling like"), LikeSettlement::Confirmed);
        let likes = d.get(&path).expect("sub-reply exists").likes;
        assert_eq!(likes.into_iter().collect::<Vec<_>>(), expected);
    }
}

#[tokio::test]
async fn like_answer_omitting_actor_is_corrected() {
    let c = node("C");
    let d = open(vec![c.clone()]).await;
    let path = NodePath::comment(c.id);
    with_server(&d, |s| s.test_set_omit_actor_from_likes(true)).await;

    let fut = d
        .toggle_like(&path)
        .expect("toggling")
        .expect("dispatching");
    assert_eq!(fut.await.expect("settling"), LikeSettlement::Confirmed);
    assert!(d.get(&path).expect("comment exists").likes.contains(&user()));

    // and the server did record it
    with_server(&d, |s| {
        assert_eq!(s.test_tree(ItemId::stub())[0].likes, vec![user()]);
    })
    .await;
}

#[tokio::test]
async fn late_failure_does_not_undo_newer_edit() {
    let c = node("original");
    let d = open(vec![c.clone()]).await;
    let path = NodePath::comment(c.id);

    let first = d
        .edit(&path, "first")
        .expect("editing")
        .expect("dispatching");
    let second = d
        .edit(&path, " second ")
        .expect("editing")
        .expect("dispatching");

    assert_eq!(second.await, Settlement::Confirmed(Some(path.clone())));
    with_server(&d, |s| s.test_set_offline(true)).await;
    assert_eq!(first.await, Settlement::Stale);

    assert_eq!(d.get(&path).expect("comment exists").text, "second");
}

#[tokio::test]
async fn concurrent_edits_settle_on_newest_success() {
    let c = node("original");
    let d = open(vec![c.clone()]).await;
    let path = NodePath::comment(c.id);

    let first = d
        .edit(&path, "first")
        .expect("editing")
        .expect("dispatching");
    let second = d
        .edit(&path, "second")
        .expect("editing")
        .expect("dispatching");
    let (first, second) = futures::join!(first, second);

    assert_eq!(first, Settlement::Stale);
    assert_eq!(second, Settlement::Confirmed(Some(path.clone())));
    assert_eq!(d.get(&path).expect("comment exists").text, "second");
}

#[tokio::test]
async fn failed_newer_edit_falls_back_to_older_success() {
    let c = node("original");
    let d = open(vec![c.clone()]).await;
    let path = NodePath::comment(c.id);

    let first = d
        .edit(&path, "first ")
        .expect("editing")
        .expect("dispatching");
    let second = d
        .edit(&path, "second")
        .expect("editing")
        .expect("dispatching");

    assert_eq!(first.await, Settlement::Stale);
    assert_eq!(d.get(&path).expect("comment exists").text, "second");
    with_server(&d, |s| s.test_reject_next(api::Error::Unknown(String::from("boom")))).await;
    assert_eq!(second.await, Settlement::RolledBack);

    assert_eq!(d.get(&path).expect("comment exists").text, "first");
}

#[tokio::test]
async fn deleting_a_reply_keeps_sibling_order_on_failure() {
    let mut c = node("C");
    c.children = (0..5).map(|i| node(&format!("reply {i}"))).collect();
    let middle = c.children[2].id;
    let d = open(vec![c.clone()]).await;
    let before = d.snapshot();

    with_server(&d, |s| s.test_set_offline(true)).await;
    let fut = d
        .delete(&NodePath::reply(c.id, middle))
        .expect("deleting reply");
    assert_eq!(d.count_all(), 5);
    assert_eq!(fut.await, Settlement::RolledBack);
    assert_eq!(d.snapshot(), before);
    assert_eq!(d.snapshot()[0].children[2].id, NodeId::from(middle));
}

#[tokio::test]
async fn others_nodes_cannot_be_edited() {
    let mut c = node("C");
    c.author_id = UserId::stub();
    let d = open(vec![c.clone()]).await;
    let path = NodePath::comment(c.id);

    let fut = d
        .edit(&path, "mine now")
        .expect("editing")
        .expect("dispatching");
    assert_eq!(fut.await, Settlement::RolledBack);
    assert_eq!(d.get(&path).expect("comment exists").text, "C");
}

#[tokio::test]
async fn edits_answered_out_of_order_keep_the_newest() {
    let c = node("original");
    let d = open(vec![c.clone()]).await;
    let path = NodePath::comment(c.id);
    with_server(&d, |s| s.test_delay_answers([3, 0])).await;

    let first = d
        .edit(&path, "first")
        .expect("editing")
        .expect("dispatching");
    let second = d
        .edit(&path, "second")
        .expect("editing")
        .expect("dispatching");
    let (first, second) = futures::join!(first, second);

    assert_eq!(first, Settlement::Stale);
    assert_eq!(second, Settlement::Confirmed(Some(path.clone())));
    assert_eq!(d.get(&path).expect("comment exists").text, "second");
    with_server(&d, |s| {
        assert_eq!(s.test_tree(ItemId::stub())[0].text, "second");
    })
    .await;
}
