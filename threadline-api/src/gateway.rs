use async_trait::async_trait;

use crate::{CommentId, GatewayError, ItemId, LikeSet, Node};

/// Remote service holding the authoritative discussion trees
///
/// Replies are addressed by their top-level comment, plus the reply they
/// hang under when they are sub-replies. Credentials are the implementor's
/// business.
#[async_trait]
pub trait Gateway {
    async fn fetch_tree(&self, item: ItemId) -> Result<Vec<Node>, GatewayError>;

    async fn create_comment(&self, item: ItemId, text: String) -> Result<Node, GatewayError>;
    async fn create_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        text: String,
        parent_reply: Option<CommentId>,
    ) -> Result<Node, GatewayError>;

    async fn edit_comment(
        &self,
        item: ItemId,
        comment: CommentId,
        text: String,
    ) -> Result<Node, GatewayError>;
    async fn edit_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        text: String,
        parent_reply: Option<CommentId>,
    ) -> Result<Node, GatewayError>;

    async fn delete_comment(&self, item: ItemId, comment: CommentId) -> Result<(), GatewayError>;
    async fn delete_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    ) -> Result<(), GatewayError>;

    async fn like_comment(&self, item: ItemId, comment: CommentId)
        -> Result<LikeSet, GatewayError>;
    async fn unlike_comment(
        &self,
        item: ItemId,
        comment: CommentId,
    ) -> Result<LikeSet, GatewayError>;
    async fn like_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    ) -> Result<LikeSet, GatewayError>;
    async fn unlike_reply(
        &self,
        item: ItemId,
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    ) -> Result<LikeSet, GatewayError>;
}
