use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pub/sub channel carrying [`UpdatedStat`] payloads.
pub const STAT_UPDATE_CHANNEL: &str = "statUpdate";

/// Kinds of activity tracked by a live counter.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum ActivityKey {
    #[serde(rename = "wishListItems")]
    WishListItems,
    #[serde(rename = "productReviews")]
    ProductReviews,
}

impl ActivityKey {
    pub const ALL: [ActivityKey; 2] =
        [ActivityKey::WishListItems, ActivityKey::ProductReviews];

    /// Counter key in the fast store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKey::WishListItems => "wishListItems",
            ActivityKey::ProductReviews => "productReviews",
        }
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every tracked counter.
pub type ActivityStats = BTreeMap<ActivityKey, i64>;

/// A counter delta broadcast after a counted mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdatedStat {
    pub key: ActivityKey,
    pub value: i64,
}
