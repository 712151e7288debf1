//! 翻译模块
//!
//! 采用清晰的模块化架构：
//! - **core**: 翻译端点适配器、回退客户端和编排服务
//! - **pipeline**: 消息文本的收集与过滤
//! - **storage**: 译文缓存与进行中请求集合
//! - **config**: 部署配置、用户设置和设置存储
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use flag_translator::translation::{Settings, TranslationClient, TranslatorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TranslationClient::from_config(
//!     &Settings::default(),
//!     &TranslatorConfig::default(),
//!     None,
//! )?;
//! let text = client.translate("Good morning", "fr").await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块 - 部署配置、用户设置与设置存储
pub mod config;

/// 核心翻译模块 - 端点适配器、回退客户端和编排服务
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 文本处理管道模块 - 正文提取、降噪与压缩
pub mod pipeline;

/// 存储管理模块 - 页面生命周期内的缓存
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use self::core::{
    normalize_language, ReactionOutcome, ReactionRequest, Translation, TranslationClient,
    TranslationProvider, TranslationService,
};

pub use config::{
    constants, ConfigManager, ExhaustedPolicy, JsonFileStore, MemoryStore, PartialSettings,
    ServiceKind, Settings, SettingsStore, TranslatorConfig,
};

pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};

// ============================================================================
// 高级API导出
// ============================================================================

pub use pipeline::{compress_text, extract_message_text, message_id};

pub use storage::{CacheKey, CacheStats, InFlightSet, TranslationCache};
