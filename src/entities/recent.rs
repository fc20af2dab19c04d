use serde::{Deserialize, Serialize};

pub(crate) const RECENT_LIMIT_MAX: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentSearch {
    #[serde(deserialize_with = "crate::utils::serde::string_or_number")]
    pub id: String,
    pub query: String,
    /// `apartment` or `location`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub searched_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentSearches {
    #[serde(default)]
    pub recent_searches: Vec<RecentSearch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteAck {
    #[serde(default)]
    pub message: String,
}
