use std::collections::{BTreeSet, HashMap};

use crate::{
    api::{GatewayError, UserId},
    CommentStore, Error, Generation, MutationEngine, NodePatch, NodePath, Request, Response,
    Target,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LikeDispatch {
    pub path: NodePath,
    pub generation: Generation,
    pub request: Request,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LikeSettlement {
    Confirmed,
    RolledBack,

    /// The answer could not be understood; likes were reverted and the
    /// whole tree should be fetched again
    Reload,

    Stale,
}

#[derive(Clone, Debug)]
struct PendingLike {
    generation: Generation,
    user: UserId,
    liked: bool,
    previous: BTreeSet<UserId>,
}

/// Like and unlike toggles, at most one in flight per node
#[derive(Debug, Default)]
pub struct LikeCoordinator {
    next_generation: u64,
    in_flight: HashMap<NodePath, PendingLike>,
}

impl LikeCoordinator {
    pub fn new() -> LikeCoordinator {
        LikeCoordinator::default()
    }

    pub fn is_loading(&self, path: &NodePath) -> bool {
        self.in_flight.contains_key(path)
    }

    /// Show in-flight toggles again on top of a freshly loaded tree, and
    /// revert them to the fetched likes if they fail
    pub fn reapply(&mut self, store: &mut CommentStore) {
        for (path, p) in self.in_flight.iter_mut() {
            let mut likes = match store.get(path) {
                Some(n) => n.likes.clone(),
                None => continue,
            };
            p.previous = likes.clone();
            if p.liked {
                likes.insert(p.user);
            } else {
                likes.remove(&p.user);
            }
            if let Err(err) = store.patch(path, NodePatch::likes(likes)) {
                tracing::warn!(%path, %err, "failed restoring like toggle");
            }
        }
    }

    /// Flip `user`'s like on the node at `path`
    ///
    /// Returns `None` if a toggle is already in flight for this node.
    pub fn toggle(
        &mut self,
        store: &mut CommentStore,
        path: &NodePath,
        user: UserId,
    ) -> Result<Option<LikeDispatch>, Error> {
        if self.is_loading(path) {
            tracing::debug!(%path, "like toggle already in flight");
            return Ok(None);
        }
        let node = store
            .get(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        let target = Target::of(path)?;
        let previous = node.likes.clone();
        let liked = !previous.contains(&user);
        let mut likes = previous.clone();
        if liked {
            likes.insert(user);
        } else {
            likes.remove(&user);
        }
        store.patch(path, NodePatch::likes(likes))?;

        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        self.in_flight.insert(
            path.clone(),
            PendingLike {
                generation,
                user,
                liked,
                previous,
            },
        );
        tracing::debug!(%path, liked, generation = generation.0, "dispatching like toggle");
        Ok(Some(LikeDispatch {
            path: path.clone(),
            generation,
            request: Request::Like {
                target,
                like: liked,
            },
        }))
    }

    /// Reconcile the likes of the node at `path` with the server's answer
    ///
    /// If the node is inside a subtree whose deletion is in flight, the
    /// outcome is written into that deletion's snapshot instead.
    pub fn settle(
        &mut self,
        store: &mut CommentStore,
        shelf: &mut MutationEngine,
        path: &NodePath,
        generation: Generation,
        outcome: Result<Response, GatewayError>,
    ) -> LikeSettlement {
        match self.in_flight.get(path) {
            Some(p) if p.generation == generation => (),
            _ => {
                tracing::debug!(%path, generation = generation.0, "dropping stale like answer");
                return LikeSettlement::Stale;
            }
        }
        let pending = match self.in_flight.remove(path) {
            Some(p) => p,
            None => return LikeSettlement::Stale,
        };

        let (likes, res) = match outcome {
            Ok(Response::Likes(set)) => {
                let mut likes = set.likes.into_iter().collect::<BTreeSet<_>>();
                // Some backends omit the acting user from their answer; its own
                // membership follows the action that was just taken
                if likes.contains(&pending.user) != pending.liked {
                    tracing::warn!(
                        %path,
                        liked = pending.liked,
                        "server like set disagrees with the action, correcting acting user"
                    );
                    if pending.liked {
                        likes.insert(pending.user);
                    } else {
                        likes.remove(&pending.user);
                    }
                }
                (likes, LikeSettlement::Confirmed)
            }
            Ok(other) => {
                tracing::warn!(%path, ?other, "unexpected answer to like toggle");
                (pending.previous, LikeSettlement::Reload)
            }
            Err(err @ GatewayError::Malformed(_)) => {
                tracing::warn!(%path, %err, "undecodable answer to like toggle");
                (pending.previous, LikeSettlement::Reload)
            }
            Err(err) => {
                tracing::info!(%path, %err, "rolling back like toggle");
                (pending.previous, LikeSettlement::RolledBack)
            }
        };
        let patch = NodePatch::likes(likes);
        if store.patch(path, patch.clone()).is_ok() || shelf.patch_shelved(path, patch) {
            return res;
        }
        match res {
            LikeSettlement::Reload => res,
            _ => LikeSettlement::Stale,
        }
    }
}
