use std::{collections::HashSet, sync::Arc};

use crate::{api, Error, Node, NodeId, NodePatch, NodePath};

/// The discussion tree of one content item
///
/// Roots are ordered newest-first, children oldest-first. Every operation
/// either fully applies or leaves the tree untouched, and readers holding a
/// [`snapshot`](CommentStore::snapshot) never see later changes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentStore {
    roots: Arc<Vec<Node>>,
}

impl CommentStore {
    pub fn new() -> CommentStore {
        CommentStore::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Node>> {
        self.roots.clone()
    }

    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Replace the whole tree, as fetched from the server
    pub fn load(&mut self, tree: Vec<api::Node>) -> Result<(), Error> {
        let roots = tree.into_iter().map(Node::from).collect::<Vec<_>>();
        let mut seen = HashSet::new();
        for r in roots.iter() {
            if !r.fits_at(1) {
                return Err(Error::TooDeep);
            }
            let mut dup = None;
            r.for_each_id(&mut |id| {
                if !seen.insert(id) {
                    dup.get_or_insert(id);
                }
            });
            if let Some(id) = dup {
                return Err(Error::DuplicateId(id));
            }
        }
        self.roots = Arc::new(roots);
        Ok(())
    }

    pub fn get(&self, path: &NodePath) -> Option<&Node> {
        let mut node = self.roots.iter().find(|n| n.id == path.comment_id())?;
        for id in path.below() {
            node = node.children.iter().find(|n| n.id == *id)?;
        }
        Some(node)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.get(path).is_some()
    }

    pub fn has_id(&self, id: &NodeId) -> bool {
        self.roots.iter().any(|r| r.contains_id(id))
    }

    /// Path of the node with id `id`, wherever it is in the tree
    pub fn find(&self, id: &NodeId) -> Option<NodePath> {
        for c in self.roots.iter() {
            let comment = NodePath::comment(c.id);
            if c.id == *id {
                return Some(comment);
            }
            for r in c.children.iter() {
                let reply = comment.child(r.id).ok()?;
                if r.id == *id {
                    return Some(reply);
                }
                if let Some(s) = r.children.iter().find(|s| s.id == *id) {
                    return reply.child(s.id).ok();
                }
            }
        }
        None
    }

    fn get_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        // avoid copying a shared tree just to find out the node is not there
        if !self.contains(path) {
            return None;
        }
        Arc::make_mut(&mut self.roots)
            .iter_mut()
            .find(|n| n.id == path.comment_id())?
            .descendant_mut(path.below())
    }

    fn siblings_mut(&mut self, parent: Option<&NodePath>) -> Option<&mut Vec<Node>> {
        match parent {
            None => Some(Arc::make_mut(&mut self.roots)),
            Some(p) => self.get_mut(p).map(|n| &mut n.children),
        }
    }

    /// Check that `node` can be placed at `depth` without breaking the depth
    /// or id-uniqueness invariants, ignoring ids of the `replacing` subtree
    fn check_insertable(
        &self,
        node: &Node,
        depth: usize,
        replacing: Option<&Node>,
    ) -> Result<(), Error> {
        if !node.fits_at(depth) {
            return Err(Error::TooDeep);
        }
        let mut seen = HashSet::new();
        let mut dup = None;
        node.for_each_id(&mut |id| {
            let replaced = replacing.map(|r| r.contains_id(&id)).unwrap_or(false);
            if !seen.insert(id) || (!replaced && self.has_id(&id)) {
                dup.get_or_insert(id);
            }
        });
        match dup {
            Some(id) => Err(Error::DuplicateId(id)),
            None => Ok(()),
        }
    }

    /// Add a new top-level comment, in front of all the others
    pub fn insert_root(&mut self, node: Node) -> Result<NodePath, Error> {
        self.check_insertable(&node, 1, None)?;
        let path = NodePath::comment(node.id);
        Arc::make_mut(&mut self.roots).insert(0, node);
        Ok(path)
    }

    /// Add a reply after all the existing replies of `parent`
    pub fn insert_child(&mut self, parent: &NodePath, node: Node) -> Result<NodePath, Error> {
        let path = parent.child(node.id)?;
        if !self.contains(parent) {
            return Err(Error::NotFound(parent.clone()));
        }
        self.check_insertable(&node, path.depth(), None)?;
        self.get_mut(parent)
            .ok_or_else(|| Error::NotFound(parent.clone()))?
            .children
            .push(node);
        Ok(path)
    }

    pub fn patch(&mut self, path: &NodePath, patch: NodePatch) -> Result<(), Error> {
        let node = self
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        patch.apply(node);
        Ok(())
    }

    /// Swap the subtree at `path` for `node`, keeping its position among its siblings
    ///
    /// Returns the path of the new node.
    pub fn replace(&mut self, path: &NodePath, node: Node) -> Result<NodePath, Error> {
        let old = self
            .get(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        self.check_insertable(&node, path.depth(), Some(old))?;
        let new_path = path.with_last(node.id);
        *self
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(path.clone()))? = node;
        Ok(new_path)
    }

    /// Cut out the subtree at `path`, returning it along with its index among its siblings
    pub fn remove(&mut self, path: &NodePath) -> Result<(Node, usize), Error> {
        if !self.contains(path) {
            return Err(Error::NotFound(path.clone()));
        }
        let last = path.last();
        let siblings = self
            .siblings_mut(path.parent().as_ref())
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        let index = siblings
            .iter()
            .position(|n| n.id == last)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        Ok((siblings.remove(index), index))
    }

    /// Put back a subtree previously cut out from `path`, at sibling position `index`
    ///
    /// If siblings went away in the meantime, `index` is clamped to the end of the list.
    pub fn reinsert(&mut self, path: &NodePath, node: Node, index: usize) -> Result<(), Error> {
        let parent = path.parent();
        if let Some(p) = &parent {
            if !self.contains(p) {
                return Err(Error::NotFound(p.clone()));
            }
        }
        self.check_insertable(&node, path.depth(), None)?;
        let siblings = self
            .siblings_mut(parent.as_ref())
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        let index = index.min(siblings.len());
        siblings.insert(index, node);
        Ok(())
    }

    /// Number of nodes at all depths
    pub fn count_all(&self) -> usize {
        self.roots.iter().map(|r| r.count()).sum()
    }

    /// Number of direct replies of the top-level comment `comment`
    pub fn reply_count(&self, comment: &NodeId) -> usize {
        self.roots
            .iter()
            .find(|n| n.id == *comment)
            .map(|n| n.children.len())
            .unwrap_or(0)
    }
}
