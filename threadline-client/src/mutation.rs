use std::collections::{BTreeMap, HashMap};

use crate::{
    api::{self, GatewayError, Time, UserId},
    CommentStore, Error, LocalId, Node, NodePatch, NodePath, Request, Response, Target,
};

/// Dispatch stamp of a mutation; later dispatches get higher generations
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Generation(pub u64);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MutationKind {
    Create,
    Edit,
    Delete,
}

/// What is needed to undo a mutation
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Snapshot {
    /// Undoing a creation excises the created node
    Nothing,
    Text {
        text: String,
        edited_at: Option<Time>,
    },
    Subtree {
        node: Node,
        index: usize,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingMutation {
    pub kind: MutationKind,
    pub path: NodePath,
    pub snapshot: Snapshot,
    pub generation: Generation,
}

/// A mutation that has been applied locally and now needs to be sent
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dispatch {
    pub generation: Generation,
    pub path: NodePath,
    pub request: Request,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Settlement {
    /// The server accepted the mutation; the node now lives at this path, if it still lives
    Confirmed(Option<NodePath>),

    /// The server refused or could not be reached, and the local change was undone
    RolledBack,

    /// The response no longer applies to the tree and was dropped
    Stale,
}

/// Applies creations, edits and deletions to a [`CommentStore`] ahead of the
/// server, and reconciles or undoes them once the server answers
///
/// Several mutations may be in flight on the same path. Only the newest one
/// may write to the store when it settles; older ones only move the newest
/// one's rollback point to whatever the server actually holds.
#[derive(Debug, Default)]
pub struct MutationEngine {
    next_generation: u64,
    next_local_id: u64,
    pending: BTreeMap<Generation, PendingMutation>,

    /// Generation of the latest success on each path that still has mutations
    /// in flight; anything older than that is stale
    floors: HashMap<NodePath, Generation>,
}

impl MutationEngine {
    pub fn new() -> MutationEngine {
        MutationEngine::default()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingMutation> {
        self.pending.values()
    }

    /// Newest in-flight mutation of `kind` on `path`
    pub fn outstanding(&self, path: &NodePath, kind: MutationKind) -> Option<&PendingMutation> {
        self.pending
            .values()
            .rev()
            .find(|m| m.kind == kind && m.path == *path)
    }

    fn bump(&mut self) -> Generation {
        self.next_generation += 1;
        Generation(self.next_generation)
    }

    fn record(&mut self, kind: MutationKind, path: NodePath, snapshot: Snapshot, g: Generation) {
        self.pending.insert(
            g,
            PendingMutation {
                kind,
                path,
                snapshot,
                generation: g,
            },
        );
    }

    /// Add a pending comment, or a pending reply to the node at `parent`
    ///
    /// Returns `None` without touching anything if `text` is not acceptable.
    pub fn create(
        &mut self,
        store: &mut CommentStore,
        parent: Option<&NodePath>,
        author: UserId,
        text: &str,
        now: Time,
    ) -> Result<Option<Dispatch>, Error> {
        if let Err(err) = api::validate_text(text) {
            tracing::debug!(?err, "ignoring invalid creation");
            return Ok(None);
        }
        let request = Request::create(parent, String::from(text))?;
        let generation = self.bump();
        self.next_local_id += 1;
        let node = Node::pending(
            LocalId(self.next_local_id),
            generation,
            author,
            String::from(text),
            now,
        );
        let path = match parent {
            None => store.insert_root(node)?,
            Some(p) => store.insert_child(p, node)?,
        };
        self.record(MutationKind::Create, path.clone(), Snapshot::Nothing, generation);
        tracing::debug!(%path, generation = generation.0, "dispatching creation");
        Ok(Some(Dispatch {
            generation,
            path,
            request,
        }))
    }

    /// Replace the text of the node at `path`
    ///
    /// Returns `None` without touching anything if `text` is not acceptable.
    pub fn edit(
        &mut self,
        store: &mut CommentStore,
        path: &NodePath,
        text: &str,
        now: Time,
    ) -> Result<Option<Dispatch>, Error> {
        if let Err(err) = api::validate_text(text) {
            tracing::debug!(?err, %path, "ignoring invalid edit");
            return Ok(None);
        }
        let node = store
            .get(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        let request = Request::Edit {
            target: Target::of(path)?,
            text: String::from(text),
        };
        let snapshot = Snapshot::Text {
            text: node.text.clone(),
            edited_at: node.edited_at,
        };
        store.patch(path, NodePatch::text(String::from(text), Some(now)))?;
        let generation = self.bump();
        self.record(MutationKind::Edit, path.clone(), snapshot, generation);
        tracing::debug!(%path, generation = generation.0, "dispatching edit");
        Ok(Some(Dispatch {
            generation,
            path: path.clone(),
            request,
        }))
    }

    /// Remove the node at `path` along with all its replies
    pub fn delete(&mut self, store: &mut CommentStore, path: &NodePath) -> Result<Dispatch, Error> {
        if !store.contains(path) {
            return Err(Error::NotFound(path.clone()));
        }
        let request = Request::Delete {
            target: Target::of(path)?,
        };
        let (node, index) = store.remove(path)?;
        // pending replies are not put back on rollback: their creation settles on its own
        let snapshot = Snapshot::Subtree {
            node: node.without_pending(),
            index,
        };
        let generation = self.bump();
        self.record(MutationKind::Delete, path.clone(), snapshot, generation);
        tracing::debug!(%path, generation = generation.0, "dispatching deletion");
        Ok(Dispatch {
            generation,
            path: path.clone(),
            request,
        })
    }

    /// Replace the tree with `tree` as fetched from the server, then lay the
    /// mutations still in flight over it again
    ///
    /// Pending nodes go back under their parent if it is still there. Pending
    /// edits keep showing their text, but now roll back to the fetched one.
    /// Nodes being deleted are taken out again.
    pub fn reload(&mut self, store: &mut CommentStore, tree: Vec<api::Node>) -> Result<(), Error> {
        let old = store.clone();
        store.load(tree)?;
        let fetched = store.clone();
        for m in self.pending.values_mut() {
            match m.kind {
                MutationKind::Create => {
                    let node = match old.get(&m.path) {
                        Some(n) if !store.contains(&m.path) => n.clone(),
                        _ => continue,
                    };
                    let res = match m.path.parent() {
                        None => store.insert_root(node),
                        Some(p) if store.contains(&p) => store.insert_child(&p, node),
                        Some(_) => continue,
                    };
                    if let Err(err) = res {
                        tracing::warn!(path = %m.path, %err, "failed restoring pending node");
                    }
                }
                MutationKind::Edit => {
                    let (shown, server) = match (old.get(&m.path), fetched.get(&m.path)) {
                        (Some(shown), Some(server)) => (shown, server),
                        _ => continue,
                    };
                    m.snapshot = Snapshot::Text {
                        text: server.text.clone(),
                        edited_at: server.edited_at,
                    };
                    let patch = NodePatch::text(shown.text.clone(), shown.edited_at);
                    if let Err(err) = store.patch(&m.path, patch) {
                        tracing::warn!(path = %m.path, %err, "failed restoring pending edit");
                    }
                }
                MutationKind::Delete => {
                    if !store.contains(&m.path) {
                        continue;
                    }
                    let (node, index) = store.remove(&m.path)?;
                    m.snapshot = Snapshot::Subtree {
                        node: node.without_pending(),
                        index,
                    };
                }
            }
        }
        tracing::debug!(
            pending = self.pending.len(),
            nodes = store.count_all(),
            "reapplied in-flight mutations over fetched tree"
        );
        Ok(())
    }

    /// Reconcile the store with the server's answer to the mutation `generation`
    pub fn settle(
        &mut self,
        store: &mut CommentStore,
        generation: Generation,
        outcome: Result<Response, GatewayError>,
    ) -> Settlement {
        let m = match self.pending.remove(&generation) {
            Some(m) => m,
            None => {
                tracing::debug!(generation = generation.0, "settling unknown mutation");
                return Settlement::Stale;
            }
        };
        let path = m.path.clone();
        let res = self.settle_mutation(store, m, outcome);
        if !self.pending.values().any(|p| p.path == path) {
            self.floors.remove(&path);
        }
        res
    }

    fn settle_mutation(
        &mut self,
        store: &mut CommentStore,
        m: PendingMutation,
        outcome: Result<Response, GatewayError>,
    ) -> Settlement {
        if matches!(self.floors.get(&m.path), Some(floor) if m.generation < *floor) {
            tracing::debug!(
                path = %m.path,
                generation = m.generation.0,
                "dropping answer to mutation superseded by a newer success"
            );
            return Settlement::Stale;
        }

        let outcome = match (m.kind, outcome) {
            (MutationKind::Create | MutationKind::Edit, Ok(Response::Node(n))) => Ok(Some(n)),
            (MutationKind::Delete, Ok(Response::Deleted)) => Ok(None),
            (_, Ok(other)) => Err(GatewayError::Malformed(format!(
                "unexpected response {other:?} to {:?}",
                m.kind
            ))),
            (_, Err(err)) => Err(err),
        };

        // A newer mutation on the same path is showing; only its rollback point moves
        let successor = self
            .pending
            .range_mut(m.generation..)
            .map(|(_, p)| p)
            .find(|p| p.path == m.path);
        if let Some(successor) = successor {
            match (&outcome, &m.snapshot) {
                (Ok(Some(n)), _) => {
                    hand_off(successor, &n.text, n.edited_at);
                }
                (Err(_), Snapshot::Text { text, edited_at }) => {
                    hand_off(successor, text, *edited_at);
                }
                _ => (),
            }
            if outcome.is_ok() {
                self.floors.insert(m.path.clone(), m.generation);
            }
            tracing::debug!(
                path = %m.path,
                generation = m.generation.0,
                "mutation superseded while in flight"
            );
            return Settlement::Stale;
        }

        match outcome {
            Ok(n) => self.confirm(store, m, n),
            Err(err) => {
                tracing::info!(path = %m.path, generation = m.generation.0, %err, "rolling back");
                self.roll_back(store, m)
            }
        }
    }

    fn confirm(
        &mut self,
        store: &mut CommentStore,
        m: PendingMutation,
        server: Option<api::Node>,
    ) -> Settlement {
        match (m.kind, server) {
            (MutationKind::Create, Some(n)) => {
                let node = Node::from(n);
                if store.has_id(&node.id) {
                    // a reload already brought in the server's copy
                    if store.contains(&m.path) {
                        if let Err(err) = store.remove(&m.path) {
                            tracing::warn!(path = %m.path, %err, "failed dropping pending node");
                        }
                    }
                    return Settlement::Confirmed(store.find(&node.id));
                }
                if !store.contains(&m.path) {
                    return self.adopt(store, &m.path, node);
                }
                match store.replace(&m.path, node) {
                    Ok(path) => Settlement::Confirmed(Some(path)),
                    Err(err) => {
                        tracing::warn!(
                            path = %m.path,
                            %err,
                            "server answered creation with an unusable node"
                        );
                        match store.remove(&m.path) {
                            Ok(_) => Settlement::RolledBack,
                            Err(_) => Settlement::Stale,
                        }
                    }
                }
            }
            (MutationKind::Edit, Some(n)) => {
                self.floors.insert(m.path.clone(), m.generation);
                let patch = NodePatch::text(n.text, n.edited_at);
                if store.patch(&m.path, patch.clone()).is_ok() {
                    return Settlement::Confirmed(Some(m.path));
                }
                if let Some(shelved) = self.shelved_mut(&m.path) {
                    patch.apply(shelved);
                }
                Settlement::Stale
            }
            (MutationKind::Delete, _) => {
                self.floors.insert(m.path, m.generation);
                Settlement::Confirmed(None)
            }
            (_, None) => Settlement::Stale,
        }
    }

    fn roll_back(&mut self, store: &mut CommentStore, m: PendingMutation) -> Settlement {
        match m.snapshot {
            Snapshot::Nothing => match store.remove(&m.path) {
                Ok(_) => Settlement::RolledBack,
                Err(_) => Settlement::Stale,
            },
            Snapshot::Text { text, edited_at } => {
                let patch = NodePatch::text(text, edited_at);
                if store.patch(&m.path, patch.clone()).is_ok() {
                    return Settlement::RolledBack;
                }
                if let Some(shelved) = self.shelved_mut(&m.path) {
                    patch.apply(shelved);
                }
                Settlement::Stale
            }
            Snapshot::Subtree { node, index } => {
                match store.reinsert(&m.path, node.clone(), index) {
                    Ok(()) => Settlement::RolledBack,
                    Err(Error::NotFound(_)) => {
                        // the parent is itself being deleted: restore into its snapshot
                        let shelved_parent = m.path.parent().and_then(|p| self.shelved_mut(&p));
                        if let Some(parent) = shelved_parent {
                            let index = index.min(parent.children.len());
                            parent.children.insert(index, node);
                        }
                        Settlement::Stale
                    }
                    Err(err) => {
                        tracing::warn!(path = %m.path, %err, "failed restoring deleted subtree");
                        Settlement::Stale
                    }
                }
            }
        }
    }

    /// Place a confirmed creation whose pending node is no longer in the
    /// store, under the parent it was created for
    fn adopt(&mut self, store: &mut CommentStore, pending: &NodePath, node: Node) -> Settlement {
        let parent = pending.parent();
        let res = match &parent {
            None => store.insert_root(node),
            Some(p) if store.contains(p) => store.insert_child(p, node),
            Some(p) => {
                // the parent is being deleted: the reply comes back if it does
                return match self.shelved_mut(p) {
                    Some(shelved) => {
                        if !shelved.contains_id(&node.id) {
                            shelved.children.push(node);
                        }
                        Settlement::Confirmed(None)
                    }
                    None => {
                        tracing::debug!(path = %pending, "created node lost its parent");
                        Settlement::Stale
                    }
                };
            }
        };
        match res {
            Ok(path) => Settlement::Confirmed(Some(path)),
            Err(err) => {
                tracing::warn!(path = %pending, %err, "failed placing confirmed node");
                Settlement::Stale
            }
        }
    }

    /// Apply `patch` to the node at `path` inside the snapshot of an
    /// in-flight deletion, so that it holds if the deletion is rolled back
    ///
    /// Returns whether such a node was found.
    pub fn patch_shelved(&mut self, path: &NodePath, patch: NodePatch) -> bool {
        match self.shelved_mut(path) {
            Some(node) => {
                patch.apply(node);
                true
            }
            None => false,
        }
    }

    /// The node at `path` inside the snapshot of an in-flight deletion
    fn shelved_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        for p in self.pending.values_mut() {
            if p.kind != MutationKind::Delete || !path.starts_with(&p.path) {
                continue;
            }
            if let Snapshot::Subtree { node, .. } = &mut p.snapshot {
                let rest = path.ids().skip(p.path.depth()).collect::<Vec<_>>();
                if let Some(n) = node.descendant_mut(&rest) {
                    return Some(n);
                }
            }
        }
        None
    }
}

/// Make `m` roll back to `text` rather than to the state it was dispatched over
fn hand_off(m: &mut PendingMutation, text: &str, edited_at: Option<Time>) {
    match &mut m.snapshot {
        Snapshot::Text {
            text: t,
            edited_at: e,
        } => {
            *t = String::from(text);
            *e = edited_at;
        }
        Snapshot::Subtree { node, .. } => {
            node.text = String::from(text);
            node.edited_at = edited_at;
        }
        Snapshot::Nothing => (),
    }
}
