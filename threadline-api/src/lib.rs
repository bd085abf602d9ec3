use chrono::Utc;

mod comment;
pub use comment::{CommentId, LikeSet, Node};

mod error;
pub use error::{Error, GatewayError};

mod gateway;
pub use gateway::Gateway;

mod item;
pub use item::ItemId;

mod user;
pub use user::UserId;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Deepest level a node may live at: comment (1), reply (2), sub-reply (3)
pub const MAX_DEPTH: usize = 3;

// The `validate` functions below are checked by the mock server before
// accepting anything, and by the client before dispatching anything.

pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}

/// Comment and reply bodies must be non-empty once surrounding whitespace is stripped
pub fn validate_text(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    match s.trim().is_empty() {
        true => Err(Error::EmptyText),
        false => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_validation() {
        assert_eq!(validate_text(""), Err(Error::EmptyText));
        assert_eq!(validate_text("  \n\t"), Err(Error::EmptyText));
        assert_eq!(
            validate_text("foo\0bar"),
            Err(Error::NullByteInString(String::from("foo\0bar")))
        );
        assert_eq!(validate_text(" hello "), Ok(()));
    }

    #[test]
    fn validate_string_never_panics() {
        bolero::check!()
            .with_type::<String>()
            .cloned()
            .for_each(|s| {
                let res = validate_string(&s);
                assert_eq!(res.is_ok(), !s.contains('\0'));
            })
    }
}
