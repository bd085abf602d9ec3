mod discussion;
pub use discussion::{Discussion, DiscussionConfig};

mod disclosure;
pub use disclosure::{ReplyDisclosure, REPLY_PAGE_SIZE};

mod error;
pub use error::Error;

mod likes;
pub use likes::{LikeCoordinator, LikeDispatch, LikeSettlement};

mod mutation;
pub use mutation::{
    Dispatch, Generation, MutationEngine, MutationKind, PendingMutation, Settlement, Snapshot,
};

mod node;
pub use node::{LocalId, Node, NodeId, NodePatch, NodeState};

mod path;
pub use path::NodePath;

mod request;
pub use request::{Request, Response, Target};

mod store;
pub use store::CommentStore;

pub mod api {
    pub use threadline_api::*;
}
