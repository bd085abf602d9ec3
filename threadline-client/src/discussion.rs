use std::{future::Future, sync::Arc};

use chrono::Utc;
use parking_lot::Mutex;

use crate::{
    api::{Gateway, ItemId, UserId},
    CommentStore, Dispatch, Error, LikeCoordinator, LikeDispatch, LikeSettlement, MutationEngine,
    MutationKind, Node, NodeId, NodePath, ReplyDisclosure, Settlement,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiscussionConfig {
    pub item: ItemId,

    /// User on whose behalf mutations and likes are made
    pub user: UserId,
}

#[derive(Debug, Default)]
struct State {
    store: CommentStore,
    engine: MutationEngine,
    likes: LikeCoordinator,
    disclosure: ReplyDisclosure,

    /// Answers settled so far, to notice fetches overtaken by them
    settled: u64,
}

/// One open discussion: its tree, the mutations in flight against it, and
/// which replies are revealed
///
/// Every mutating method applies its change right away and hands back a
/// future that talks to the gateway and reconciles the tree once awaited.
/// The state lock is never held across an await point.
pub struct Discussion<G> {
    config: DiscussionConfig,
    gateway: G,
    state: Mutex<State>,
}

impl<G: Gateway> Discussion<G> {
    pub fn new(config: DiscussionConfig, gateway: G) -> Discussion<G> {
        Discussion {
            config,
            gateway,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &DiscussionConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Fetch the whole tree, replacing anything known so far
    pub async fn mount(&self) -> Result<(), Error> {
        self.reload().await?;
        self.state.lock().disclosure.clear();
        Ok(())
    }

    /// Fetch the whole tree, keeping whatever is still in flight applied on top of it
    async fn reload(&self) -> Result<(), Error> {
        loop {
            let seen = self.state.lock().settled;
            let tree = self.gateway.fetch_tree(self.config.item).await?;
            let mut state = self.state.lock();
            if state.settled != seen {
                // the fetched tree may predate an answer that was already applied
                tracing::debug!(item = %self.config.item.0, "tree overtaken while fetching");
                continue;
            }
            let State {
                store,
                engine,
                likes,
                ..
            } = &mut *state;
            engine.reload(store, tree)?;
            likes.reapply(store);
            tracing::info!(
                item = %self.config.item.0,
                nodes = store.count_all(),
                "loaded discussion tree"
            );
            return Ok(());
        }
    }

    pub fn create_comment(
        &self,
        text: &str,
    ) -> Result<Option<impl Future<Output = Settlement> + '_>, Error> {
        self.create(None, text)
    }

    pub fn create_reply(
        &self,
        parent: &NodePath,
        text: &str,
    ) -> Result<Option<impl Future<Output = Settlement> + '_>, Error> {
        self.create(Some(parent), text)
    }

    fn create(
        &self,
        parent: Option<&NodePath>,
        text: &str,
    ) -> Result<Option<impl Future<Output = Settlement> + '_>, Error> {
        let dispatch = {
            let mut state = self.state.lock();
            let State { store, engine, .. } = &mut *state;
            engine.create(store, parent, self.config.user, text, Utc::now())?
        };
        Ok(dispatch.map(|d| self.run(d)))
    }

    pub fn edit(
        &self,
        path: &NodePath,
        text: &str,
    ) -> Result<Option<impl Future<Output = Settlement> + '_>, Error> {
        let dispatch = {
            let mut state = self.state.lock();
            let State { store, engine, .. } = &mut *state;
            engine.edit(store, path, text, Utc::now())?
        };
        Ok(dispatch.map(|d| self.run(d)))
    }

    pub fn delete(&self, path: &NodePath) -> Result<impl Future<Output = Settlement> + '_, Error> {
        let dispatch = {
            let mut state = self.state.lock();
            let State { store, engine, .. } = &mut *state;
            engine.delete(store, path)?
        };
        Ok(self.run(dispatch))
    }

    async fn run(&self, d: Dispatch) -> Settlement {
        let outcome = d.request.send(&self.gateway, self.config.item).await;
        let mut state = self.state.lock();
        state.settled += 1;
        let State { store, engine, .. } = &mut *state;
        let res = engine.settle(store, d.generation, outcome);
        tracing::debug!(path = %d.path, generation = d.generation.0, ?res, "mutation settled");
        res
    }

    /// Like or unlike the node at `path` as the configured user
    ///
    /// Returns `None` if a toggle on this node is still in flight.
    pub fn toggle_like(
        &self,
        path: &NodePath,
    ) -> Result<Option<impl Future<Output = Result<LikeSettlement, Error>> + '_>, Error> {
        let dispatch = {
            let mut state = self.state.lock();
            let State { store, likes, .. } = &mut *state;
            likes.toggle(store, path, self.config.user)?
        };
        Ok(dispatch.map(|d| self.run_like(d)))
    }

    async fn run_like(&self, d: LikeDispatch) -> Result<LikeSettlement, Error> {
        let outcome = d.request.send(&self.gateway, self.config.item).await;
        let res = {
            let mut state = self.state.lock();
            state.settled += 1;
            let State {
                store,
                engine,
                likes,
                ..
            } = &mut *state;
            likes.settle(store, engine, &d.path, d.generation, outcome)
        };
        if res == LikeSettlement::Reload {
            tracing::info!(path = %d.path, "reloading tree after undecodable like answer");
            self.reload().await?;
        }
        Ok(res)
    }

    /// The tree as it currently stands, unaffected by later changes
    pub fn snapshot(&self) -> Arc<Vec<Node>> {
        self.state.lock().store.snapshot()
    }

    pub fn get(&self, path: &NodePath) -> Option<Node> {
        self.state.lock().store.get(path).cloned()
    }

    pub fn count_all(&self) -> usize {
        self.state.lock().store.count_all()
    }

    pub fn is_outstanding(&self, path: &NodePath, kind: MutationKind) -> bool {
        self.state.lock().engine.outstanding(path, kind).is_some()
    }

    pub fn is_like_loading(&self, path: &NodePath) -> bool {
        self.state.lock().likes.is_loading(path)
    }

    pub fn reveal_replies(&self, comment: NodeId) -> usize {
        let mut state = self.state.lock();
        let total = state.store.reply_count(&comment);
        state.disclosure.reveal(comment, total)
    }

    pub fn show_more_replies(&self, comment: NodeId) -> usize {
        let mut state = self.state.lock();
        let total = state.store.reply_count(&comment);
        state.disclosure.show_more(comment, total)
    }

    pub fn hide_replies(&self, comment: &NodeId) {
        self.state.lock().disclosure.hide(comment);
    }

    pub fn revealed_replies(&self, comment: &NodeId) -> usize {
        let state = self.state.lock();
        state
            .disclosure
            .revealed(comment, state.store.reply_count(comment))
    }

    pub fn has_more_replies(&self, comment: &NodeId) -> bool {
        let state = self.state.lock();
        state
            .disclosure
            .has_more(comment, state.store.reply_count(comment))
    }
}
