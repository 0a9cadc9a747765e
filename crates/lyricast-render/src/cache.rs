//! Rasterized subtitle cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::text::RasterizedText;

/// Bounded cache of rasterized lines.
///
/// Eviction removes the oldest *inserted* entry. Hits do not refresh an
/// entry's position, so this is FIFO rather than LRU.
pub struct TextureCache {
    entries: HashMap<String, Arc<RasterizedText>>,
    insertion_order: VecDeque<String>,
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl TextureCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            max_size: max_size.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Cache key for a line of text in a style at a viewport size.
    pub fn key(text: &str, style: &str, font_size: f32, width: u32, height: u32) -> String {
        format!("{}_{}_{}_{}x{}", text, style, font_size, width, height)
    }

    pub fn get(&mut self, key: &str) -> Option<Arc<RasterizedText>> {
        let found = self.entries.get(key).cloned();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, key: String, value: Arc<RasterizedText>) {
        if self.entries.insert(key.clone(), value).is_some() {
            return;
        }
        self.insertion_order.push_back(key);
        while self.entries.len() > self.max_size {
            let Some(oldest) = self.insertion_order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            tracing::trace!(key = %oldest, "evicted rasterized text");
        }
    }

    /// Cached value for `key`, rasterizing with `make` on a miss.
    pub fn get_or_try_insert<E>(
        &mut self,
        key: String,
        make: impl FnOnce() -> Result<RasterizedText, E>,
    ) -> Result<Arc<RasterizedText>, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = Arc::new(make()?);
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{rasterize_line, BoxRasterizer};

    fn entry(text: &str) -> Arc<RasterizedText> {
        Arc::new(rasterize_line(&BoxRasterizer, text, 10.0).unwrap())
    }

    #[test]
    fn test_key_includes_viewport() {
        let a = TextureCache::key("hi", "Default", 20.0, 1920, 1080);
        let b = TextureCache::key("hi", "Default", 20.0, 1280, 720);
        assert_ne!(a, b);
        assert_eq!(a, "hi_Default_20_1920x1080");
    }

    #[test]
    fn test_evicts_oldest_inserted_not_least_recent() {
        let mut cache = TextureCache::new(2);
        cache.insert("a".into(), entry("a"));
        cache.insert("b".into(), entry("b"));
        // touching "a" does not protect it
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), entry("c"));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut cache = TextureCache::new(2);
        cache.insert("a".into(), entry("a"));
        cache.insert("b".into(), entry("b"));
        cache.insert("a".into(), entry("a"));
        cache.insert("c".into(), entry("c"));
        assert!(!cache.contains("a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_or_try_insert_counts() {
        let mut cache = TextureCache::new(4);
        let mut calls = 0;
        for _ in 0..3 {
            cache
                .get_or_try_insert::<()>("k".into(), || {
                    calls += 1;
                    Ok(rasterize_line(&BoxRasterizer, "k", 10.0).unwrap())
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.stats(), (2, 1));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut cache = TextureCache::new(4);
        let result = cache.get_or_try_insert("k".into(), || Err("boom"));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
