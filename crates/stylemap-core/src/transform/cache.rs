//! Bounded transform result cache
//!
//! Keys are SHA-256 digests of the transform inputs: the element XML, the
//! resolved processor, the full template and the call-site parameters.
//! Eviction removes the oldest inserted entry once the cap is reached;
//! reads do not refresh an entry's position.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{Params, TransformOutput, TransformTemplate};

/// Default number of cached results
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Insertion-ordered bounded cache
#[derive(Debug)]
pub struct TransformCache {
    entries: HashMap<String, TransformOutput>,
    order: VecDeque<String>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl TransformCache {
    /// Create a cache holding at most `capacity` results
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a result, counting the hit or miss
    pub fn get(&mut self, key: &str) -> Option<TransformOutput> {
        match self.entries.get(key) {
            Some(output) => {
                self.hits += 1;
                Some(output.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a result, evicting the oldest entry when full
    pub fn insert(&mut self, key: String, output: TransformOutput) {
        if self.capacity == 0 {
            return;
        }
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = output;
            return;
        }
        self.evict_to(self.capacity - 1);
        self.order.push_back(key.clone());
        self.entries.insert(key, output);
    }

    /// Change the cap, evicting the oldest entries that no longer fit
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_to(capacity);
    }

    /// Current cap
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_to(&mut self, len: usize) {
        while self.entries.len() > len {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drop all entries and reset counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Number of cached results
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Cache key for a transform invocation.
///
/// The whole template is hashed, so re-registering a name with a new body
/// or new defaults never serves results computed from the old one.
pub fn cache_key(xml: &str, template: &TransformTemplate, processor: &str, params: &Params) -> String {
    let template = serde_json::to_string(template).unwrap_or_default();
    let params = serde_json::to_string(params).unwrap_or_default();

    let mut hasher = Sha256::new();
    for part in [xml, processor, template.as_str(), params.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let result = hasher.finalize();
    format!(
        "sha256:{}",
        result.iter().map(|b| format!("{:02x}", b)).collect::<String>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> TransformOutput {
        TransformOutput::Text(s.to_string())
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let mut cache = TransformCache::new(2);
        cache.insert("a".into(), text("1"));
        cache.insert("b".into(), text("2"));

        // Reading "a" does not protect it from eviction
        assert_eq!(cache.get("a"), Some(text("1")));
        cache.insert("c".into(), text("3"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(text("2")));
        assert_eq!(cache.get("c"), Some(text("3")));
    }

    #[test]
    fn test_reinsert_updates_in_place() {
        let mut cache = TransformCache::new(2);
        cache.insert("a".into(), text("1"));
        cache.insert("a".into(), text("2"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(text("2")));
    }

    #[test]
    fn test_shrinking_capacity_evicts_oldest() {
        let mut cache = TransformCache::new(4);
        for key in ["a", "b", "c", "d"] {
            cache.insert(key.into(), text(key));
        }

        cache.set_capacity(2);
        assert_eq!(cache.capacity(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(text("c")));

        cache.insert("e".into(), text("e"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c"), None);

        cache.set_capacity(0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = TransformCache::new(0);
        cache.insert("a".into(), text("1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_and_clear() {
        let mut cache = TransformCache::new(4);
        cache.insert("a".into(), TransformOutput::Bool(true));
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats { capacity: 4, ..Default::default() });
    }

    #[test]
    fn test_cache_key_depends_on_all_inputs() {
        let mut params = Params::new();
        params.insert("level".to_string(), json!(1));

        let heading = TransformTemplate::new("heading", "body");
        let key = cache_key("<p/>", &heading, "rhai", &params);
        assert!(key.starts_with("sha256:"));
        assert_eq!(key, cache_key("<p/>", &heading, "rhai", &params));
        assert_ne!(key, cache_key("<p/>", &TransformTemplate::new("title", "body"), "rhai", &params));
        assert_ne!(key, cache_key("<p/>", &TransformTemplate::new("heading", "other"), "rhai", &params));
        assert_ne!(key, cache_key("<p/>", &heading.clone().with_parameter("level", 2), "rhai", &params));
        assert_ne!(key, cache_key("<p/>", &heading, "native", &params));
        assert_ne!(key, cache_key("<r/>", &heading, "rhai", &params));
        assert_ne!(key, cache_key("<p/>", &heading, "rhai", &Params::new()));
    }
}
