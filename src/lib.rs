//! # Flag Translator
//!
//! 在聊天页面上监听国旗表情回应，把被回应的消息翻译成国旗对应的语言，
//! 并把译文以浮层形式显示在消息旁边。
//!
//! ## 模块组织
//!
//! - `flags` - 国旗与语言代码的映射
//! - `host` - 宿主页面能力接口
//! - `parsers` - 基于 HTML 文档的宿主实现
//! - `detection` - 回应识别与消息容器关联
//! - `translation` - 端点链、缓存、编排服务与配置
//! - `observer` - 页面变化观察层
//! - `core` - 单个页面的翻译上下文
//! - `env` - 类型化的环境变量

pub mod core;
pub mod detection;
pub mod env;
pub mod flags;
pub mod host;
pub mod observer;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use crate::core::{FlagTranslator, RuntimeMessage, RuntimeReply};
pub use detection::{detect, find_message_container, ContainerStrategy, ReactionEvent};
pub use flags::{decode_flag, flag_to_language};
pub use host::{Overlay, OverlayKind, PageHost, Rect};
pub use observer::{ChatObserver, MutationKind, MutationRecord};
pub use parsers::{html_to_page, serialize_page, HtmlPage};
pub use translation::{
    ReactionOutcome, Settings, TranslationClient, TranslationError, TranslationResult,
    TranslatorConfig,
};
