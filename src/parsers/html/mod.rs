//! HTML 宿主页面
//!
//! - `dom`: 基于 scraper 的 [`HtmlPage`]，实现 [`crate::host::PageHost`]
//! - `serializer`: 带字符集的序列化
//! - `utils`: 转义与浮层标记

pub mod dom;
pub mod serializer;
pub mod utils;

pub use dom::{html_to_page, HtmlPage};
pub use serializer::serialize_page;
pub use utils::{escape_html, overlay_markup};
