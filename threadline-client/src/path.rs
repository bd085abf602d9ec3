use std::fmt;

use arrayvec::ArrayVec;

use crate::{api::MAX_DEPTH, Error, NodeId};

/// Address of a node: its top-level comment, then the reply and sub-reply leading to it
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct NodePath {
    comment: NodeId,
    below: ArrayVec<NodeId, { MAX_DEPTH - 1 }>,
}

impl NodePath {
    pub fn comment(comment: impl Into<NodeId>) -> NodePath {
        NodePath {
            comment: comment.into(),
            below: ArrayVec::new(),
        }
    }

    pub fn reply(comment: impl Into<NodeId>, reply: impl Into<NodeId>) -> NodePath {
        let mut below = ArrayVec::new();
        below.push(reply.into());
        NodePath {
            comment: comment.into(),
            below,
        }
    }

    pub fn sub_reply(
        comment: impl Into<NodeId>,
        reply: impl Into<NodeId>,
        sub_reply: impl Into<NodeId>,
    ) -> NodePath {
        let mut below = ArrayVec::new();
        below.push(reply.into());
        below.push(sub_reply.into());
        NodePath {
            comment: comment.into(),
            below,
        }
    }

    /// Path of the child `id` of the node at this path
    pub fn child(&self, id: impl Into<NodeId>) -> Result<NodePath, Error> {
        let mut res = self.clone();
        res.below.try_push(id.into()).map_err(|_| Error::TooDeep)?;
        Ok(res)
    }

    pub fn parent(&self) -> Option<NodePath> {
        let mut res = self.clone();
        res.below.pop()?;
        Some(res)
    }

    /// 1 for a comment, 2 for a reply, 3 for a sub-reply
    pub fn depth(&self) -> usize {
        1 + self.below.len()
    }

    /// Id of the top-level comment this path goes through
    pub fn comment_id(&self) -> NodeId {
        self.comment
    }

    /// Id of the node this path points to
    pub fn last(&self) -> NodeId {
        self.below.last().copied().unwrap_or(self.comment)
    }

    /// Ids below the top-level comment, outermost first
    pub fn below(&self) -> &[NodeId] {
        &self.below
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.comment).chain(self.below.iter().copied())
    }

    /// This path, with its last id swapped for `id`
    pub fn with_last(&self, id: NodeId) -> NodePath {
        let mut res = self.clone();
        match res.below.last_mut() {
            Some(last) => *last = id,
            None => res.comment = id,
        }
        res
    }

    /// Whether `self` points to `ancestor` or one of its descendants
    pub fn starts_with(&self, ancestor: &NodePath) -> bool {
        self.depth() >= ancestor.depth() && self.ids().zip(ancestor.ids()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.comment)?;
        for id in self.below.iter() {
            write!(f, "/{}", id)?;
        }
        Ok(())
    }
}
