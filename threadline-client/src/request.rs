use crate::{
    api::{CommentId, Gateway, GatewayError, ItemId, LikeSet},
    api, Error, NodePath,
};

/// How the gateway addresses an existing node
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    Comment(CommentId),
    Reply {
        comment: CommentId,
        reply: CommentId,
        parent_reply: Option<CommentId>,
    },
}

impl Target {
    /// Fails if any node along the path is still pending
    pub fn of(path: &NodePath) -> Result<Target, Error> {
        let ids = path
            .ids()
            .map(|id| id.server())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::NodePending(path.clone()))?;
        match ids[..] {
            [comment] => Ok(Target::Comment(comment)),
            [comment, reply] => Ok(Target::Reply {
                comment,
                reply,
                parent_reply: None,
            }),
            [comment, parent_reply, reply] => Ok(Target::Reply {
                comment,
                reply,
                parent_reply: Some(parent_reply),
            }),
            _ => Err(Error::TooDeep),
        }
    }
}

/// A gateway call, ready to be sent
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Request {
    CreateComment {
        text: String,
    },
    CreateReply {
        comment: CommentId,
        parent_reply: Option<CommentId>,
        text: String,
    },
    Edit {
        target: Target,
        text: String,
    },
    Delete {
        target: Target,
    },
    Like {
        target: Target,
        like: bool,
    },
}

impl Request {
    /// Request creating a child of the node at `parent`, or a new comment
    pub fn create(parent: Option<&NodePath>, text: String) -> Result<Request, Error> {
        match parent.map(Target::of).transpose()? {
            None => Ok(Request::CreateComment { text }),
            Some(Target::Comment(comment)) => Ok(Request::CreateReply {
                comment,
                parent_reply: None,
                text,
            }),
            Some(Target::Reply {
                comment,
                reply,
                parent_reply: None,
            }) => Ok(Request::CreateReply {
                comment,
                parent_reply: Some(reply),
                text,
            }),
            Some(Target::Reply { .. }) => Err(Error::TooDeep),
        }
    }

    pub async fn send<G>(&self, gateway: &G, item: ItemId) -> Result<Response, GatewayError>
    where
        G: Gateway + ?Sized,
    {
        Ok(match self.clone() {
            Request::CreateComment { text } => {
                Response::Node(gateway.create_comment(item, text).await?)
            }
            Request::CreateReply {
                comment,
                parent_reply,
                text,
            } => Response::Node(
                gateway
                    .create_reply(item, comment, text, parent_reply)
                    .await?,
            ),
            Request::Edit {
                target: Target::Comment(comment),
                text,
            } => Response::Node(gateway.edit_comment(item, comment, text).await?),
            Request::Edit {
                target:
                    Target::Reply {
                        comment,
                        reply,
                        parent_reply,
                    },
                text,
            } => Response::Node(
                gateway
                    .edit_reply(item, comment, reply, text, parent_reply)
                    .await?,
            ),
            Request::Delete {
                target: Target::Comment(comment),
            } => {
                gateway.delete_comment(item, comment).await?;
                Response::Deleted
            }
            Request::Delete {
                target:
                    Target::Reply {
                        comment,
                        reply,
                        parent_reply,
                    },
            } => {
                gateway
                    .delete_reply(item, comment, reply, parent_reply)
                    .await?;
                Response::Deleted
            }
            Request::Like {
                target: Target::Comment(comment),
                like: true,
            } => Response::Likes(gateway.like_comment(item, comment).await?),
            Request::Like {
                target: Target::Comment(comment),
                like: false,
            } => Response::Likes(gateway.unlike_comment(item, comment).await?),
            Request::Like {
                target:
                    Target::Reply {
                        comment,
                        reply,
                        parent_reply,
                    },
                like: true,
            } => Response::Likes(
                gateway
                    .like_reply(item, comment, reply, parent_reply)
                    .await?,
            ),
            Request::Like {
                target:
                    Target::Reply {
                        comment,
                        reply,
                        parent_reply,
                    },
                like: false,
            } => Response::Likes(
                gateway
                    .unlike_reply(item, comment, reply, parent_reply)
                    .await?,
            ),
        })
    }
}

/// What a successful gateway call answered
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    Node(api::Node),
    Deleted,
    Likes(LikeSet),
}
