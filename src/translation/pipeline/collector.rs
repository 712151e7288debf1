//! 消息文本收集器
//!
//! 从消息容器里取出要翻译的正文，并为容器生成一个尽力而为的标识

use std::sync::atomic::{AtomicU64, Ordering};

use crate::host::PageHost;
use crate::translation::config::constants;

use super::filters::{normalize_whitespace, strip_noise};

/// 正文节点选择器，按优先级排列
pub const TEXT_SELECTORS: &[&str] = &[
    "[data-testid=\"msg-text\"]",
    ".message-text",
    ".selectable-text",
    "[data-testid=\"conversation-text\"]",
    ".copyable-text span",
    "span[dir=\"ltr\"]",
    "span[dir=\"rtl\"]",
];

/// 回退到整段文本时需要剔除的子元素
const UNWANTED_SELECTORS: &[&str] = &[
    "[data-testid*=\"reaction\"]",
    ".message-reaction",
    "[data-testid=\"msg-time\"]",
    ".message-datetime",
    "[data-testid=\"msg-dblcheck\"]",
    ".message-status",
];

/// 时间戳所在的元素
const TIMESTAMP_SELECTORS: &[&str] = &["[data-testid=\"msg-time\"]", ".message-datetime"];

static GENERATED_IDS: AtomicU64 = AtomicU64::new(0);

/// 提取消息正文
///
/// 先按 [`TEXT_SELECTORS`] 查找，第一个非空结果胜出；都没有时取整个容器的
/// 文本，剔除回应、时间、送达状态等子元素以及国旗和时间戳。
pub fn extract_message_text<H: PageHost>(host: &H, container: &H::Node) -> String {
    for selector in TEXT_SELECTORS {
        for node in host.select_all(container, selector) {
            if host.is_inside_overlay(&node) {
                continue;
            }
            let text = normalize_whitespace(&host.text_content(&node));
            if !text.is_empty() {
                tracing::trace!("正文来自选择器 {}", selector);
                return text;
            }
        }
    }

    let mut text = host.text_content(container);
    for selector in UNWANTED_SELECTORS {
        for node in host.select_all(container, selector) {
            let unwanted = host.text_content(&node);
            if !unwanted.trim().is_empty() {
                text = text.replacen(&unwanted, " ", 1);
            }
        }
    }

    strip_noise(&text)
}

fn timestamp<H: PageHost>(host: &H, container: &H::Node) -> String {
    TIMESTAMP_SELECTORS
        .iter()
        .find_map(|selector| host.select_first(container, selector))
        .map(|node| host.text_content(&node).trim().to_string())
        .or_else(|| {
            host.select_first(container, "[data-pre-plain-text]")
                .and_then(|node| host.attr(&node, "data-pre-plain-text"))
        })
        .unwrap_or_default()
}

/// 生成消息标识
///
/// 依次使用容器的 `data-id`、`id`、第一个带 `data-id` 的后代，再退到
/// 正文前 100 个字符加时间戳的哈希，最后是递增的生成值。标识在重新渲染后
/// 不保证稳定，只用于日志。
pub fn message_id<H: PageHost>(host: &H, container: &H::Node, text: &str) -> String {
    let attribute = host
        .attr(container, "data-id")
        .or_else(|| host.attr(container, "id"))
        .or_else(|| {
            host.select_first(container, "[data-id]")
                .and_then(|node| host.attr(&node, "data-id"))
        })
        .filter(|id| !id.trim().is_empty());

    if let Some(id) = attribute {
        return id;
    }

    let prefix: String = text.chars().take(constants::MESSAGE_ID_TEXT_CHARS).collect();
    let timestamp = timestamp(host, container);
    if !prefix.is_empty() || !timestamp.is_empty() {
        let mut hasher = blake3::Hasher::new();
        hasher.update(prefix.as_bytes());
        hasher.update(timestamp.as_bytes());
        let hash = hasher.finalize().to_hex();
        return format!("msg-h{}", &hash[..16]);
    }

    let counter = GENERATED_IDS.fetch_add(1, Ordering::Relaxed);
    format!("msg-{}-{}", chrono::Utc::now().timestamp_millis(), counter)
}
