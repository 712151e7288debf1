//! # 解析器模块
//!
//! - `html` - HTML 页面解析、选择器查询、浮层插入

pub mod html;

pub use html::{html_to_page, serialize_page, HtmlPage};
