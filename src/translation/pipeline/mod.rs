//! 翻译管道模块
//!
//! 提供消息文本的收集与过滤

pub mod collector;
pub mod filters;

// 重新导出主要类型
pub use collector::{extract_message_text, message_id, TEXT_SELECTORS};
pub use filters::{compress_text, is_translatable, normalize_whitespace, strip_noise};
