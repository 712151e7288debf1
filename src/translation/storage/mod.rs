//! 存储模块
//!
//! 页面生命周期内的译文缓存与进行中请求集合。

pub mod cache;

pub use cache::{CacheEntry, CacheKey, CacheStats, InFlightGuard, InFlightSet, TranslationCache};
