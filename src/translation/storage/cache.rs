//! 翻译缓存模块
//!
//! 页面挂载期间的译文缓存，以及正在进行中的请求集合。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::translation::pipeline::normalize_whitespace;

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存键：归一化后的消息文本 + 目标语言
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub language: String,
}

impl CacheKey {
    pub fn new(text: &str, language: &str) -> Self {
        Self {
            text: normalize_whitespace(text),
            language: language.to_string(),
        }
    }
}

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub translated_text: String,
    pub created_at: Instant,
    pub hits: u64,
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// 翻译缓存
///
/// 不限大小、不淘汰，后写覆盖先写。断开页面时整体清空。
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: DashMap<CacheKey, CacheEntry>,
    requests: AtomicU64,
    hits: AtomicU64,
}

// ============================================================================
// 实现
// ============================================================================

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取缓存条目
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let mut entry = self.entries.get_mut(key)?;
        entry.hits += 1;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.translated_text.clone())
    }

    /// 插入缓存条目
    pub fn insert(&self, key: CacheKey, translated_text: String) {
        self.entries.insert(
            key,
            CacheEntry {
                translated_text,
                created_at: Instant::now(),
                hits: 0,
            },
        );
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("翻译缓存已清空");
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> CacheStats {
        let total_requests = self.requests.load(Ordering::Relaxed);
        let cache_hits = self.hits.load(Ordering::Relaxed);
        CacheStats {
            total_requests,
            cache_hits,
            cache_misses: total_requests.saturating_sub(cache_hits),
            total_entries: self.entries.len(),
        }
    }
}

// ============================================================================
// 进行中的请求
// ============================================================================

/// 正在翻译的键集合
#[derive(Debug, Default, Clone)]
pub struct InFlightSet {
    pending: Arc<DashMap<CacheKey, Instant>>,
}

/// 持有期间对应的键处于进行中状态，drop 时释放
#[derive(Debug)]
pub struct InFlightGuard {
    pending: Arc<DashMap<CacheKey, Instant>>,
    key: CacheKey,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 原子地占用一个键，已被占用时返回 `None`
    pub fn try_acquire(&self, key: CacheKey) -> Option<InFlightGuard> {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(InFlightGuard {
                    pending: Arc::clone(&self.pending),
                    key,
                })
            }
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&self) {
        self.pending.clear();
    }
}

impl InFlightGuard {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some((key, started)) = self.pending.remove(&self.key) {
            tracing::trace!("释放进行中标记 {}，持续 {:?}", key.language, started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_whitespace() {
        assert_eq!(CacheKey::new("  Hello\n world ", "fr"), CacheKey::new("Hello world", "fr"));
        assert_ne!(CacheKey::new("Hello", "fr"), CacheKey::new("Hello", "de"));
    }

    #[test]
    fn test_cache_last_write_wins() {
        let cache = TranslationCache::new();
        let key = CacheKey::new("Hello", "fr");
        assert_eq!(cache.get(&key), None);

        cache.insert(key.clone(), "Salut".to_string());
        cache.insert(key.clone(), "Bonjour".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("Bonjour"));

        let stats = cache.get_stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.total_entries, 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let set = InFlightSet::new();
        let key = CacheKey::new("Hello", "fr");

        let guard = set.try_acquire(key.clone()).unwrap();
        assert!(set.contains(&key));
        assert!(set.try_acquire(key.clone()).is_none());

        drop(guard);
        assert!(!set.contains(&key));
        assert!(set.try_acquire(key).is_some());
    }
}
