//! Ephemeral note storage.
//!
//! Process-lifetime key-value store backing the `add-note` tool and the
//! `note://` resource surface. Last write wins on a name; nothing is ever
//! deleted or persisted.

use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct NoteStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or silently overwrite.
    pub fn add(&self, name: &str, content: &str) {
        self.lock().insert(name.to_string(), content.to_string());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    /// Stored note names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
