use uuid::Uuid;

use crate::STUB_UUID;

/// The content item a discussion hangs off of
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn stub() -> ItemId {
        ItemId(STUB_UUID)
    }
}
