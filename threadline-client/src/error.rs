use crate::{api::GatewayError, NodeId, NodePath};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no node at {0}")]
    NotFound(NodePath),

    #[error("replies cannot be nested deeper than sub-replies")]
    TooDeep,

    #[error("node {0} is already in the tree")]
    DuplicateId(NodeId),

    #[error("node at {0} has not been confirmed by the server yet")]
    NodePending(NodePath),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
