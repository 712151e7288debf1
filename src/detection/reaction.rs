//! 回应元素识别与国旗提取

use std::sync::OnceLock;

use regex::Regex;

use crate::flags::{decode_flag, flag_to_language};
use crate::host::PageHost;

use super::association::{find_message_container, ContainerStrategy, MESSAGE_CONTAINER_SELECTOR};

/// 在变化的子树里查找回应元素的选择器
pub const REACTION_SELECTORS: &[&str] = &[
    "[data-testid*=\"reaction\"]",
    ".message-reaction",
    "[title*=\"reacted\"]",
    "[aria-label*=\"reacted\"]",
    "[aria-label*=\"reaction\"]",
    "[data-testid=\"reactions\"]",
    ".reactions-container",
    "[data-testid=\"emoji-reactions\"]",
    "button[aria-label*=\"reaction\"]",
    "button[title*=\"reaction\"]",
    "span[title*=\"reaction\"]",
];

/// 宽泛扫描的元素类型
const BROAD_SCAN_SELECTOR: &str = "button, span, div";

/// 检测到的一次国旗回应
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionEvent<N> {
    pub flag: &'static str,
    pub language: &'static str,
    /// 触发检测的回应元素
    pub source: N,
    pub container: N,
    /// 找到容器所用的策略
    pub strategy: ContainerStrategy,
}

fn reaction_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"reaction\s+[\x{1F1E6}-\x{1F1FF}]{2}").expect("valid reaction label regex")
    })
}

/// 元素本身看起来是不是一个回应
pub fn is_reaction<H: PageHost>(host: &H, node: &H::Node) -> bool {
    let test_id = host.attr(node, "data-testid").unwrap_or_default();
    let class = host.attr(node, "class").unwrap_or_default();
    let title = host.attr(node, "title").unwrap_or_default();
    let aria_label = host.attr(node, "aria-label").unwrap_or_default();

    test_id.contains("reaction")
        || class.contains("reaction")
        || title.contains("reacted")
        || aria_label.contains("reacted")
        || aria_label.contains("reaction")
        || (host.tag_name(node).as_deref() == Some("button")
            && reaction_label_regex().is_match(&aria_label))
}

fn has_decodable_flag<H: PageHost>(host: &H, node: &H::Node) -> bool {
    ["aria-label", "title"]
        .iter()
        .filter_map(|name| host.attr(node, name))
        .chain(std::iter::once(host.own_text(node)))
        .any(|text| decode_flag(&text).is_some())
}

/// 收集 `root` 及其子树中的回应候选
///
/// 三种扫描各自独立：根节点本身、回应选择器、以及带可识别国旗的
/// `button, span, div`。选择器扫描之间可能重复，宽泛扫描不会重复已有节点。
/// 浮层内部的节点一律忽略。
pub fn find_candidates<H: PageHost>(host: &H, root: &H::Node) -> Vec<H::Node> {
    let mut candidates = Vec::new();

    if is_reaction(host, root) {
        candidates.push(root.clone());
    }

    for selector in REACTION_SELECTORS {
        candidates.extend(host.select_all(root, selector));
    }

    for node in host.select_all(root, BROAD_SCAN_SELECTOR) {
        if !candidates.contains(&node) && has_decodable_flag(host, &node) {
            candidates.push(node);
        }
    }

    candidates.retain(|node| !host.is_inside_overlay(node));
    candidates
}

/// 依次检查 aria-label、title、文本和内部 HTML
fn flag_in_element<H: PageHost>(host: &H, node: &H::Node) -> Option<&'static str> {
    host.attr(node, "aria-label")
        .and_then(|label| decode_flag(&label))
        .or_else(|| host.attr(node, "title").and_then(|title| decode_flag(&title)))
        .or_else(|| decode_flag(&host.text_content(node)))
        .or_else(|| decode_flag(&host.inner_html(node)))
}

/// 提取回应携带的国旗
///
/// 先看元素本身，再看父元素和祖父元素，最后看兄弟元素。
/// 向上查找止于消息容器，浮层内容不参与。
pub fn extract_flag<H: PageHost>(host: &H, node: &H::Node) -> Option<&'static str> {
    if let Some(flag) = flag_in_element(host, node) {
        return Some(flag);
    }

    let parent = host.parent(node);
    let grandparent = parent.as_ref().and_then(|parent| host.parent(parent));
    for ancestor in parent.iter().chain(grandparent.iter()) {
        if host.is_inside_overlay(ancestor) {
            break;
        }
        if let Some(flag) = flag_in_element(host, ancestor) {
            return Some(flag);
        }
        // 不越过消息容器，上层会包含其他消息的回应
        if host.matches(ancestor, MESSAGE_CONTAINER_SELECTOR) {
            break;
        }
    }

    let siblings = parent
        .as_ref()
        .map(|parent| host.children(parent))
        .unwrap_or_default();
    siblings
        .iter()
        .filter(|sibling| *sibling != node && !host.is_inside_overlay(sibling))
        .find_map(|sibling| flag_in_element(host, sibling))
}

/// 从一个节点得到完整的回应事件
pub fn detect<H: PageHost>(host: &H, node: &H::Node) -> Option<ReactionEvent<H::Node>> {
    if host.is_inside_overlay(node) {
        return None;
    }

    let Some(flag) = extract_flag(host, node) else {
        tracing::trace!("节点上没有可识别的国旗: {:?}", node);
        return None;
    };
    let language = flag_to_language(flag)?;

    let Some((container, strategy)) = find_message_container(host, node) else {
        tracing::debug!("国旗 {} 找不到消息容器，丢弃", flag);
        return None;
    };

    tracing::debug!("检测到回应 {} → {}（{:?}）", flag, language, strategy);
    Some(ReactionEvent {
        flag,
        language,
        source: node.clone(),
        container,
        strategy,
    })
}
