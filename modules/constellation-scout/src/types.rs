use serde::{Deserialize, Serialize};

/// One community member as written to the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub handle: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub followers: Option<u64>,
    #[serde(default)]
    pub pfp_url: String,
}

impl Profile {
    /// A profile built from the row alone, used when no hover card showed up.
    pub fn from_row(handle: String, name: String, pfp_url: String) -> Self {
        Self {
            handle,
            name,
            bio: String::new(),
            followers: None,
            pfp_url,
        }
    }
}

/// What happens when a handle that is already stored gets scraped again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpsertPolicy {
    /// First capture wins; re-encounters are no-ops.
    #[default]
    KeepFirst,
    /// Replace the stored record in place, keeping its original position.
    Refresh,
}
