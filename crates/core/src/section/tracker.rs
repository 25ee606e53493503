//! The process-wide "currently active section" value.

use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Identifier of a page section, e.g. `home` or `works`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for SectionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SectionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Single source of truth for the section the user is looking at.
///
/// Cloning yields another handle to the same value. Writes are last-write-wins
/// and a write of the current value is not broadcast.
#[derive(Debug, Clone)]
pub struct ActiveSection {
    tx: Arc<watch::Sender<SectionId>>,
}

impl ActiveSection {
    pub fn new(initial: impl Into<SectionId>) -> Self {
        let (tx, _rx) = watch::channel(initial.into());
        Self { tx: Arc::new(tx) }
    }

    /// Current value.
    pub fn get(&self) -> SectionId {
        self.tx.borrow().clone()
    }

    /// Overwrite the current value.
    ///
    /// Returns whether the value changed; subscribers are only woken when it did.
    pub fn set(&self, id: impl Into<SectionId>) -> bool {
        let id = id.into();
        let changed = self.tx.send_if_modified(|current| {
            if *current == id {
                false
            } else {
                *current = id.clone();
                true
            }
        });
        if changed {
            tracing::debug!(section = %id, "active section changed");
        }
        changed
    }

    /// Receiver that is marked changed on every distinct write.
    pub fn subscribe(&self) -> watch::Receiver<SectionId> {
        self.tx.subscribe()
    }
}
