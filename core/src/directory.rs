use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A user row returned by directory search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users whose display name starts with `query`.
    async fn search(&self, query: &str) -> Result<Vec<DirectoryEntry>>;
}

/// Case-sensitive prefix match, the same window as a `[query, query + '\u{f8ff}']`
/// range scan over an ordered name index.
pub fn matches_prefix(display_name: &str, query: &str) -> bool {
    !query.is_empty() && display_name.starts_with(query)
}
