//! Parameter state cache
//!
//! Maps parameter paths to the last raw value seen for them. Entries are
//! inserted or overwritten, never removed. Every write bumps a version counter
//! published on a `watch` channel, which is what [`StateCache::wait_for`]
//! sleeps on: a waiter wakes on each write, rechecks its key, and gives up at
//! its deadline.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::SessionError;

/// Concurrency-safe map of parameter path → raw value
#[derive(Debug)]
pub struct StateCache {
    entries: RwLock<HashMap<String, String>>,
    version: watch::Sender<u64>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    /// Create an empty cache
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: RwLock::new(HashMap::new()),
            version,
        }
    }

    /// Last known value for `path`
    pub fn get(&self, path: &str) -> Option<String> {
        self.entries.read().get(path).cloned()
    }

    /// Whether `path` has ever been written
    pub fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    /// Insert or overwrite a value, returning the previous one
    pub fn put(&self, path: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let previous = self.entries.write().insert(path.into(), value.into());
        self.version.send_modify(|v| *v = v.wrapping_add(1));
        previous
    }

    /// Number of cached parameters
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of writes applied so far
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Copy of every entry, sorted by path
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// Wait until `path` is present, up to `timeout`
    ///
    /// Returns immediately when the value is already cached.
    pub async fn wait_for(&self, path: &str, timeout: Duration) -> Result<String, SessionError> {
        let deadline = Instant::now() + timeout;
        // Subscribing first means a write racing the check below still wakes us
        let mut changes = self.version.subscribe();

        loop {
            if let Some(value) = self.get(path) {
                return Ok(value);
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => break,
            }
        }

        self.get(path).ok_or_else(|| SessionError::Timeout {
            path: path.to_string(),
            timeout,
        })
    }
}
