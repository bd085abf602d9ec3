use std::{collections::BTreeSet, fmt};

use crate::{
    api::{self, CommentId, Time, UserId, MAX_DEPTH},
    Generation,
};

/// Identifier handed out locally to nodes the server has not acknowledged yet
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LocalId(pub u64);

/// Identifier of a node in the local tree
///
/// Local and server ids live in disjoint id-spaces, so a server id can
/// never be mistaken for a pending one.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum NodeId {
    Server(CommentId),
    Local(LocalId),
}

impl NodeId {
    pub fn server(&self) -> Option<CommentId> {
        match self {
            NodeId::Server(id) => Some(*id),
            NodeId::Local(_) => None,
        }
    }
}

impl From<CommentId> for NodeId {
    fn from(id: CommentId) -> NodeId {
        NodeId::Server(id)
    }
}

impl From<LocalId> for NodeId {
    fn from(id: LocalId) -> NodeId {
        NodeId::Local(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Server(id) => write!(f, "{}", id.0),
            NodeId::Local(id) => write!(f, "local-{}", id.0),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    Confirmed,

    /// Created locally, waiting for the creation with this generation to settle
    Pending { created_by: Generation },
}

/// A comment, reply or sub-reply, depending on the depth it lives at
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub state: NodeState,
    pub text: String,
    pub author_id: UserId,
    pub created_at: Time,
    pub edited_at: Option<Time>,
    pub likes: BTreeSet<UserId>,

    /// Replies, in chronological order
    pub children: Vec<Node>,
}

impl From<api::Node> for Node {
    fn from(n: api::Node) -> Node {
        Node {
            id: NodeId::Server(n.id),
            state: NodeState::Confirmed,
            text: n.text,
            author_id: n.author_id,
            created_at: n.created_at,
            edited_at: n.edited_at,
            likes: n.likes.into_iter().collect(),
            children: n.children.into_iter().map(Node::from).collect(),
        }
    }
}

impl Node {
    pub fn pending(
        id: LocalId,
        created_by: Generation,
        author_id: UserId,
        text: String,
        now: Time,
    ) -> Node {
        Node {
            id: NodeId::Local(id),
            state: NodeState::Pending { created_by },
            text,
            author_id,
            created_at: now,
            edited_at: None,
            likes: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, NodeState::Pending { .. })
    }

    /// Number of levels in this subtree, counting this node
    pub fn height(&self) -> usize {
        1 + self.children.iter().map(|c| c.height()).max().unwrap_or(0)
    }

    /// Whether this subtree fits when rooted at `depth` (1 for a comment)
    pub fn fits_at(&self, depth: usize) -> bool {
        depth >= 1 && depth + self.height() - 1 <= MAX_DEPTH
    }

    /// Number of nodes in this subtree, counting this node
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|c| c.count()).sum::<usize>()
    }

    pub fn contains_id(&self, id: &NodeId) -> bool {
        self.id == *id || self.children.iter().any(|c| c.contains_id(id))
    }

    /// Visit every id in this subtree, this node first
    pub fn for_each_id(&self, f: &mut impl FnMut(NodeId)) {
        f(self.id);
        for c in self.children.iter() {
            c.for_each_id(f);
        }
    }

    /// Walks down `ids`, starting with a child of this node
    pub fn descendant_mut(&mut self, ids: &[NodeId]) -> Option<&mut Node> {
        match ids.split_first() {
            None => Some(self),
            Some((id, rest)) => self
                .children
                .iter_mut()
                .find(|c| c.id == *id)?
                .descendant_mut(rest),
        }
    }

    /// This subtree with every pending descendant dropped
    pub fn without_pending(&self) -> Node {
        Node {
            children: self
                .children
                .iter()
                .filter(|c| !c.is_pending())
                .map(|c| c.without_pending())
                .collect(),
            ..self.clone()
        }
    }
}

/// In-place change to a node's mutable fields
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodePatch {
    pub text: Option<String>,
    pub edited_at: Option<Option<Time>>,
    pub likes: Option<BTreeSet<UserId>>,
}

impl NodePatch {
    pub fn text(text: String, edited_at: Option<Time>) -> NodePatch {
        NodePatch {
            text: Some(text),
            edited_at: Some(edited_at),
            likes: None,
        }
    }

    pub fn likes(likes: BTreeSet<UserId>) -> NodePatch {
        NodePatch {
            text: None,
            edited_at: None,
            likes: Some(likes),
        }
    }

    pub fn apply(self, n: &mut Node) {
        if let Some(text) = self.text {
            n.text = text;
        }
        if let Some(edited_at) = self.edited_at {
            n.edited_at = edited_at;
        }
        if let Some(likes) = self.likes {
            n.likes = likes;
        }
    }
}
