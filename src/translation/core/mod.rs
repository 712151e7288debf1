//! 翻译系统核心模块
//!
//! 核心模块分为三层：
//!
//! - **适配器层** (`providers.rs`): 每个翻译端点一个适配器，统一实现 [`TranslationProvider`]
//! - **客户端层** (`client.rs`): 按顺序尝试端点，聚合失败，应用耗尽策略
//! - **服务层** (`service.rs`): 处理回应，负责缓存、去重和浮层生命周期
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── TranslationCache / InFlightSet (storage/cache.rs)
//!     ├── compress_text (pipeline/filters.rs)
//!     └── TranslationClient (client.rs)
//!             ├── LibreTranslateProvider / DeepLProvider
//!             └── GoogleFallbackProvider
//! ```

pub mod client;
pub mod providers;
pub mod service;

pub use client::TranslationClient;
pub use providers::{
    normalize_language, parse_google_response, DeepLProvider, GoogleFallbackProvider,
    LibreTranslateProvider, Translation, TranslationProvider,
};
pub use service::{
    ClientSlot, ReactionOutcome, ReactionRequest, ServiceStats, ServiceStatsSnapshot,
    TranslationService,
};
