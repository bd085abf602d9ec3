use std::fmt;

use uuid::Uuid;

use crate::STUB_UUID;

/// Author of a node, or member of its like set
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first group is enough to tell users apart on screen
        let id = self.0.to_string();
        write!(f, "user-{}", id.split('-').next().unwrap_or(&id))
    }
}
