//! Session-scoped translation cache.
//! Key: blake3 hash of (len(target_lang) | target_lang | normalized_text). The declared source language
//! is not part of the key. Unbounded: entries live as long as the session.

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::TranslationResult;

pub struct RequestCache {
    inner: Mutex<LruCache<[u8; 32], TranslationResult>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LruCache::unbounded()),
        }
    }

    pub fn compute_key(normalized_text: &str, target_lang: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(target_lang.len() as u64).to_le_bytes());
        hasher.update(target_lang.as_bytes());
        hasher.update(b"|");
        hasher.update(normalized_text.as_bytes());
        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, normalized_text: &str, target_lang: &str) -> Option<TranslationResult> {
        let key = Self::compute_key(normalized_text, target_lang);
        let hit = self.inner.lock().get(&key).cloned();
        if hit.is_some() {
            debug!(target_lang, "translation cache hit");
        }
        hit
    }

    pub fn put(&self, normalized_text: &str, target_lang: &str, result: TranslationResult) {
        let key = Self::compute_key(normalized_text, target_lang);
        self.inner.lock().put(key, result);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}
