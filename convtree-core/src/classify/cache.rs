//! Classification memo
//!
//! Classification is a pure function of its inputs, so results can be
//! memoized by hashing those inputs. Entries are never updated in place;
//! clearing the cache only costs recomputation.

use super::{BlockKind, ClassificationResult, ClassifyContext};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Read-through cache of classification results keyed by input hash.
#[derive(Debug, Default, Clone)]
pub struct ClassificationCache {
    entries: HashMap<String, ClassificationResult>,
    hits: u64,
    misses: u64,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ClassificationResult> {
        self.entries.get(key)
    }

    /// Insert unless the key is already present; existing entries win.
    pub fn insert(&mut self, key: String, result: ClassificationResult) {
        self.entries.entry(key).or_insert(result);
    }

    /// Return the cached result, or compute, store and return it.
    pub fn get_or_insert_with<F>(&mut self, key: String, compute: F) -> ClassificationResult
    where
        F: FnOnce() -> ClassificationResult,
    {
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            return hit.clone();
        }
        self.misses += 1;
        let result = compute();
        self.entries.insert(key, result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        tracing::debug!(entries = self.entries.len(), "Clearing classification cache");
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// SHA-256 over every input that can change a classification.
///
/// Fields are length-prefixed so adjacent values cannot alias.
pub fn cache_key(block: &BlockKind, content: &str, context: &ClassifyContext<'_>) -> String {
    let mut hasher = Sha256::new();
    let mut field = |value: &str| {
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    };

    field(block.as_str());
    field(if block.is_error() { "1" } else { "0" });
    field(context.tool_name.unwrap_or(""));
    field(context.message_role.map(|r| r.as_str()).unwrap_or(""));
    let input = context
        .tool_input
        .map(|v| serde_json::to_string(v).unwrap_or_default())
        .unwrap_or_default();
    field(&input);
    field(content);

    hex::encode(hasher.finalize())
}
