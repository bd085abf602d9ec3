use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use threadline_api::{
    validate_text, CommentId, Error, Gateway, GatewayError, ItemId, LikeSet, Node, UserId,
};
use tokio::sync::Mutex;

/// Authoritative discussion trees, one per item
#[derive(Debug, Default)]
pub struct MockServer {
    items: HashMap<ItemId, Vec<Node>>,
    faults: Faults,
}

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    rejections: VecDeque<Error>,
    malformed_likes: bool,
    omit_actor_from_likes: bool,

    /// Scheduler turns each answer waits before reaching the caller, in call order
    delays: VecDeque<usize>,
}

/// Where a reply lives: its top-level comment, and its parent reply if it is a sub-reply
#[derive(Clone, Copy, Debug)]
struct ReplyAddr {
    comment: CommentId,
    parent_reply: Option<CommentId>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    /// Replace the tree of `item`
    pub fn test_set_tree(&mut self, item: ItemId, tree: Vec<Node>) {
        self.items.insert(item, tree);
    }

    pub fn test_tree(&self, item: ItemId) -> &[Node] {
        self.items.get(&item).map(|t| &t[..]).unwrap_or(&[])
    }

    /// Make every call fail as if the network was down
    pub fn test_set_offline(&mut self, offline: bool) {
        self.faults.offline = offline;
    }

    /// Refuse the next mutation or like with `err`, without applying it
    pub fn test_reject_next(&mut self, err: Error) {
        self.faults.rejections.push_back(err);
    }

    /// Apply like calls, but answer them with an undecodable body
    pub fn test_set_malformed_likes(&mut self, malformed: bool) {
        self.faults.malformed_likes = malformed;
    }

    /// Leave the acting user out of like answers, as some backends do
    pub fn test_set_omit_actor_from_likes(&mut self, omit: bool) {
        self.faults.omit_actor_from_likes = omit;
    }

    /// Hold back the answers to the next calls, each by its number of
    /// scheduler turns, so that they reach the client out of order
    ///
    /// Calls are still applied in the order they are made. Once `delays` runs
    /// out, answers wait a single turn.
    pub fn test_delay_answers(&mut self, delays: impl IntoIterator<Item = usize>) {
        self.faults.delays.extend(delays);
    }

    pub fn test_clear_faults(&mut self) {
        self.faults = Faults::default();
    }

    pub fn fetch_tree(&self, item: ItemId) -> Result<Vec<Node>, Error> {
        Ok(self.test_tree(item).to_vec())
    }

    fn tree_mut(&mut self, item: ItemId) -> &mut Vec<Node> {
        self.items.entry(item).or_default()
    }

    fn comment_mut(&mut self, item: ItemId, comment: CommentId) -> Result<&mut Node, Error> {
        self.tree_mut(item)
            .iter_mut()
            .find(|c| c.id == comment)
            .ok_or(Error::NotFound)
    }

    /// The list `reply` is a member of, or a new reply would be added to
    fn replies_mut(&mut self, item: ItemId, addr: ReplyAddr) -> Result<&mut Vec<Node>, Error> {
        let comment = self.comment_mut(item, addr.comment)?;
        match addr.parent_reply {
            None => Ok(&mut comment.children),
            Some(p) => Ok(&mut comment
                .children
                .iter_mut()
                .find(|r| r.id == p)
                .ok_or(Error::NotFound)?
                .children),
        }
    }

    fn reply_mut(
        &mut self,
        item: ItemId,
        addr: ReplyAddr,
        reply: CommentId,
    ) -> Result<&mut Node, Error> {
        self.replies_mut(item, addr)?
            .iter_mut()
            .find(|r| r.id == reply)
            .ok_or(Error::NotFound)
    }

    pub fn create_comment(
        &mut self,
        user: UserId,
        item: ItemId,
        text: String,
    ) -> Result<Node, Error> {
        validate_text(&text)?;
        let node = Node::now(user, String::from(text.trim()));
        self.tree_mut(item).insert(0, node.clone());
        Ok(node)
    }

    pub fn create_reply(
        &mut self,
        user: UserId,
        item: ItemId,
        comment: CommentId,
        text: String,
        parent_reply: Option<CommentId>,
    ) -> Result<Node, Error> {
        validate_text(&text)?;
        let node = Node::now(user, String::from(text.trim()));
        let addr = ReplyAddr {
            comment,
            parent_reply,
        };
        self.replies_mut(item, addr)?.push(node.clone());
        Ok(node)
    }

    pub fn edit_comment(
        &mut self,
        user: UserId,
        item: ItemId,
        comment: CommentId,
        text: String,
    ) -> Result<Node, Error> {
        validate_text(&text)?;
        edit(self.comment_mut(item, comment)?, user, &text)
    }

    pub fn edit_reply(
        &mut self,
        user: UserId,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        text: String,
        parent_reply: Option<CommentId>,
    ) -> Result<Node, Error> {
        validate_text(&text)?;
        let addr = ReplyAddr {
            comment,
            parent_reply,
        };
        edit(self.reply_mut(item, addr, reply)?, user, &text)
    }

    pub fn delete_comment(
        &mut self,
        user: UserId,
        item: ItemId,
        comment: CommentId,
    ) -> Result<(), Error> {
        remove(self.tree_mut(item), user, comment)
    }

    pub fn delete_reply(
        &mut self,
        user: UserId,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    ) -> Result<(), Error> {
        let addr = ReplyAddr {
            comment,
            parent_reply,
        };
        remove(self.replies_mut(item, addr)?, user, reply)
    }

    pub fn like_comment(
        &mut self,
        user: UserId,
        item: ItemId,
        comment: CommentId,
        like: bool,
    ) -> Result<LikeSet, Error> {
        let omit = self.faults.omit_actor_from_likes;
        set_like(self.comment_mut(item, comment)?, user, like, omit)
    }

    pub fn like_reply(
        &mut self,
        user: UserId,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
        like: bool,
    ) -> Result<LikeSet, Error> {
        let omit = self.faults.omit_actor_from_likes;
        let addr = ReplyAddr {
            comment,
            parent_reply,
        };
        set_like(self.reply_mut(item, addr, reply)?, user, like, omit)
    }
}

fn edit(node: &mut Node, user: UserId, text: &str) -> Result<Node, Error> {
    if node.author_id != user {
        return Err(Error::PermissionDenied);
    }
    node.text = String::from(text.trim());
    node.edited_at = Some(Utc::now());
    let mut res = node.clone();
    res.children.clear();
    Ok(res)
}

fn remove(siblings: &mut Vec<Node>, user: UserId, id: CommentId) -> Result<(), Error> {
    let index = siblings
        .iter()
        .position(|n| n.id == id)
        .ok_or(Error::NotFound)?;
    if siblings[index].author_id != user {
        return Err(Error::PermissionDenied);
    }
    siblings.remove(index);
    Ok(())
}

fn set_like(
    node: &mut Node,
    user: UserId,
    like: bool,
    omit_actor: bool,
) -> Result<LikeSet, Error> {
    node.likes.retain(|u| *u != user);
    if like {
        node.likes.push(user);
    }
    let mut likes = node.likes.clone();
    if omit_actor {
        likes.retain(|u| *u != user);
    }
    Ok(LikeSet { likes })
}

/// [`Gateway`] over a shared [`MockServer`], acting as one user
#[derive(Clone, Debug)]
pub struct MockGateway {
    server: Arc<Mutex<MockServer>>,
    user: UserId,
}

impl MockGateway {
    pub fn new(server: Arc<Mutex<MockServer>>, user: UserId) -> MockGateway {
        MockGateway { server, user }
    }

    pub fn server(&self) -> &Arc<Mutex<MockServer>> {
        &self.server
    }

    /// Apply `f` right away, and hand back its answer after the configured delay
    async fn round_trip<T>(
        &self,
        f: impl FnOnce(&mut MockServer) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let (res, delay) = {
            let mut server = self.server.lock().await;
            let delay = server.faults.delays.pop_front().unwrap_or(1);
            let res = if server.faults.offline {
                Err(GatewayError::Network(String::from("mock server is offline")))
            } else {
                f(&mut *server)
            };
            (res, delay)
        };
        for _ in 0..delay {
            tokio::task::yield_now().await;
        }
        res
    }

    async fn call<T>(
        &self,
        f: impl FnOnce(&mut MockServer) -> Result<T, Error>,
    ) -> Result<T, GatewayError> {
        self.round_trip(|server| mutate(server, f)).await
    }

    async fn call_likes(
        &self,
        f: impl FnOnce(&mut MockServer) -> Result<LikeSet, Error>,
    ) -> Result<LikeSet, GatewayError> {
        self.round_trip(|server| {
            let likes = mutate(server, f)?;
            if server.faults.malformed_likes {
                return Err(GatewayError::Malformed(String::from(
                    "expected value at line 1 column 1",
                )));
            }
            Ok(likes)
        })
        .await
    }
}

/// Run `f` unless a rejection is queued
fn mutate<T>(
    server: &mut MockServer,
    f: impl FnOnce(&mut MockServer) -> Result<T, Error>,
) -> Result<T, GatewayError> {
    match server.faults.rejections.pop_front() {
        Some(err) => Err(wire(err)),
        None => f(server).map_err(wire),
    }
}

/// Errors go through their wire encoding, like they would over http
fn wire(err: Error) -> GatewayError {
    GatewayError::from_response(err.status_code(), &err.contents())
}

#[async_trait]
impl Gateway for MockGateway {
    async fn fetch_tree(&self, item: ItemId) -> Result<Vec<Node>, GatewayError> {
        self.round_trip(|s| s.fetch_tree(item).map_err(wire)).await
    }

    async fn create_comment(&self, item: ItemId, text: String) -> Result<Node, GatewayError> {
        let user = self.user;
        self.call(|s| s.create_comment(user, item, text)).await
    }

    async fn create_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        text: String,
        parent_reply: Option<CommentId>,
    ) -> Result<Node, GatewayError> {
        let user = self.user;
        self.call(|s| s.create_reply(user, item, comment, text, parent_reply))
            .await
    }

    async fn edit_comment(
        &self,
        item: ItemId,
        comment: CommentId,
        text: String,
    ) -> Result<Node, GatewayError> {
        let user = self.user;
        self.call(|s| s.edit_comment(user, item, comment, text)).await
    }

    async fn edit_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        text: String,
        parent_reply: Option<CommentId>,
    ) -> Result<Node, GatewayError> {
        let user = self.user;
        self.call(|s| s.edit_reply(user, item, comment, reply, text, parent_reply))
            .await
    }

    async fn delete_comment(&self, item: ItemId, comment: CommentId) -> Result<(), GatewayError> {
        let user = self.user;
        self.call(|s| s.delete_comment(user, item, comment)).await
    }

    async fn delete_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    ) -> Result<(), GatewayError> {
        let user = self.user;
        self.call(|s| s.delete_reply(user, item, comment, reply, parent_reply))
            .await
    }

    async fn like_comment(
        &self,
        item: ItemId,
        comment: CommentId,
    ) -> Result<LikeSet, GatewayError> {
        let user = self.user;
        self.call_likes(|s| s.like_comment(user, item, comment, true))
            .await
    }

    async fn unlike_comment(
        &self,
        item: ItemId,
        comment: CommentId,
    ) -> Result<LikeSet, GatewayError> {
        let user = self.user;
        self.call_likes(|s| s.like_comment(user, item, comment, false))
            .await
    }

    async fn like_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    ) -> Result<LikeSet, GatewayError> {
        let user = self.user;
        self.call_likes(|s| s.like_reply(user, item, comment, reply, parent_reply, true))
            .await
    }

    async fn unlike_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    ) -> Result<LikeSet, GatewayError> {
        let user = self.user;
        self.call_likes(|s| s.like_reply(user, item, comment, reply, parent_reply, false))
            .await
    }
}
