use chrono::Utc;
use uuid::Uuid;

use crate::{Time, UserId, MAX_DEPTH};

/// Server-issued identifier of a comment, reply or sub-reply
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn new() -> CommentId {
        CommentId(Uuid::new_v4())
    }
}

/// A comment, reply or sub-reply as the server sends it
///
/// The same shape is used at every depth; `children` is empty for
/// sub-replies.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Node {
    pub id: CommentId,
    pub text: String,
    pub author_id: UserId,
    pub created_at: Time,
    #[serde(default)]
    pub edited_at: Option<Time>,

    /// Users who liked this node, in no particular order
    #[serde(default)]
    pub likes: Vec<UserId>,

    /// Replies, in chronological order
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn now(author_id: UserId, text: String) -> Node {
        Node {
            id: CommentId::new(),
            text,
            author_id,
            created_at: Utc::now(),
            edited_at: None,
            likes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Number of levels in this subtree, counting this node
    pub fn height(&self) -> usize {
        1 + self.children.iter().map(|c| c.height()).max().unwrap_or(0)
    }

    /// Whether this subtree fits when rooted at `depth` (1 for a comment)
    pub fn fits_at(&self, depth: usize) -> bool {
        depth >= 1 && depth + self.height() - 1 <= MAX_DEPTH
    }
}

/// Body of a like or unlike response
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeSet {
    pub likes: Vec<UserId>,
}
