//! Shard id to stats-server mapping.

use std::collections::HashMap;

/// Read-only mapping from the shard a node reports to the base URL of the
/// stats server responsible for it.
///
/// The directory is built once from configuration. The reporter resolves the
/// shard after every reconnect, so a node that migrates between shards is
/// re-targeted without a restart, but only to servers that were configured
/// up front.
#[derive(Debug, Clone, Default)]
pub struct ShardDirectory {
    inner: HashMap<u32, String>,
}

impl ShardDirectory {
    /// Creates a directory from shard/base-URL pairs.
    pub fn new(map: HashMap<u32, String>) -> Self {
        Self { inner: map }
    }

    /// Resolves the base URL for `shard`, if one is configured.
    pub fn resolve(&self, shard: u32) -> Option<&str> {
        self.inner.get(&shard).map(String::as_str)
    }
}

impl FromIterator<(u32, String)> for ShardDirectory {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
