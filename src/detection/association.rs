//! 回应与消息容器的关联
//!
//! 五种策略按顺序尝试，第一个成功的胜出。每个策略都是独立的函数，
//! 可以单独测试。

use std::fmt;

use crate::host::PageHost;
use crate::translation::config::constants;

/// 单条消息的容器
pub const MESSAGE_CONTAINER_SELECTOR: &str = "[data-testid=\"msg-container\"]";

/// 消息容器选择器，用于向上查找
pub const CONTAINER_SELECTORS: &[&str] = &[
    MESSAGE_CONTAINER_SELECTOR,
    ".message-in",
    ".message-out",
    "[data-testid=\"msg\"]",
    "[role=\"row\"]",
    "[data-testid=\"conversation-panel-messages\"] > div",
    "[data-testid*=\"message\"]",
    ".focusable-list-item",
];

/// 带位置的消息类元素
const MESSAGE_LIKE_SELECTOR: &str = ".copyable-text, .selectable-text, [data-testid*=\"message\"]";

/// 把消息类元素提升到所在容器
const LIFT_SELECTOR: &str =
    "[data-testid=\"msg-container\"], [data-testid*=\"message\"], .message-in, .message-out";

/// 最近渲染的消息
const ACTIVE_MESSAGE_SELECTORS: &[&str] = &[
    ".message-in:last-child, .message-out:last-child",
    "[data-testid=\"msg-container\"]:last-child",
    "[data-testid*=\"message\"]:last-child",
    ".copyable-text:last-child",
];

/// 会话里的最后一条消息
const LAST_MESSAGE_SELECTORS: &[&str] = &[
    "[data-testid=\"conversation-panel-messages\"] > div:last-child",
    ".message-list > div:last-child",
    "#main .copyable-text:last-of-type",
    "[data-testid=\"msg-container\"]",
];

/// 找到容器所用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStrategy {
    /// 最近的容器祖先
    ClosestAncestor,
    /// 屏幕距离最近的消息
    Proximity,
    /// 最近渲染的消息
    ActiveMessage,
    /// 有限深度的祖先扫描
    AncestorContext,
    /// 会话最后一条消息
    LastMessage,
}

impl fmt::Display for ContainerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerStrategy::ClosestAncestor => "closest-ancestor",
            ContainerStrategy::Proximity => "proximity",
            ContainerStrategy::ActiveMessage => "active-message",
            ContainerStrategy::AncestorContext => "ancestor-context",
            ContainerStrategy::LastMessage => "last-message",
        };
        write!(f, "{}", name)
    }
}

type StrategyFn<H> = fn(&H, &<H as PageHost>::Node) -> Option<<H as PageHost>::Node>;

/// 按顺序排列的全部策略
pub fn strategies<H: PageHost>() -> [(ContainerStrategy, StrategyFn<H>); 5] {
    [
        (ContainerStrategy::ClosestAncestor, by_closest_ancestor::<H> as StrategyFn<H>),
        (ContainerStrategy::Proximity, by_proximity::<H> as StrategyFn<H>),
        (ContainerStrategy::ActiveMessage, by_active_message::<H> as StrategyFn<H>),
        (ContainerStrategy::AncestorContext, by_ancestor_context::<H> as StrategyFn<H>),
        (ContainerStrategy::LastMessage, by_last_message::<H> as StrategyFn<H>),
    ]
}

/// 为回应元素找到消息容器
pub fn find_message_container<H: PageHost>(
    host: &H,
    reaction: &H::Node,
) -> Option<(H::Node, ContainerStrategy)> {
    for (strategy, find) in strategies::<H>() {
        if let Some(container) = find(host, reaction) {
            tracing::debug!("容器策略 {} 命中", strategy);
            return Some((container, strategy));
        }
    }

    tracing::debug!("所有容器策略都失败了");
    None
}

/// (a) 从父元素开始，按选择器优先级查找最近的容器祖先
pub fn by_closest_ancestor<H: PageHost>(host: &H, reaction: &H::Node) -> Option<H::Node> {
    let parent = host.parent(reaction)?;
    CONTAINER_SELECTORS
        .iter()
        .find_map(|selector| host.closest(&parent, selector))
}

/// (b) 左上角曼哈顿距离最近且小于阈值的消息类元素
pub fn by_proximity<H: PageHost>(host: &H, reaction: &H::Node) -> Option<H::Node> {
    let origin = host.bounding_rect(reaction)?;

    let (closest, distance) = host
        .query_all(MESSAGE_LIKE_SELECTOR)
        .into_iter()
        .filter(|node| !host.is_inside_overlay(node))
        .filter_map(|node| {
            let rect = host.bounding_rect(&node)?;
            Some((node, origin.corner_distance(&rect)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    if distance >= constants::PROXIMITY_THRESHOLD_PX {
        return None;
    }

    tracing::trace!("最近的消息距离 {}px", distance);
    Some(host.closest(&closest, LIFT_SELECTOR).unwrap_or(closest))
}

fn last_match<H: PageHost>(host: &H, selector: &str) -> Option<H::Node> {
    host.query_all(selector)
        .into_iter()
        .filter(|node| !host.is_inside_overlay(node))
        .last()
}

/// (c) 最近渲染的消息，取文档顺序中最后一个匹配
pub fn by_active_message<H: PageHost>(host: &H, _reaction: &H::Node) -> Option<H::Node> {
    ACTIVE_MESSAGE_SELECTORS
        .iter()
        .find_map(|selector| last_match(host, selector))
}

fn looks_like_message<H: PageHost>(host: &H, node: &H::Node) -> bool {
    host.select_first(node, ".copyable-text").is_some()
        || host.select_first(node, ".selectable-text").is_some()
        || host.matches(node, "[data-testid*=\"message\"], [data-testid=\"msg-container\"]")
}

/// (d) 向上最多扫描若干层，找包含消息文本标记或本身是消息的祖先
pub fn by_ancestor_context<H: PageHost>(host: &H, reaction: &H::Node) -> Option<H::Node> {
    let mut current = host.parent(reaction);
    let mut depth = 0;

    while let Some(node) = current {
        if depth >= constants::ANCESTOR_SCAN_DEPTH {
            break;
        }
        if looks_like_message(host, &node) {
            tracing::trace!("祖先扫描在深度 {} 找到容器", depth);
            return Some(node);
        }
        current = host.parent(&node);
        depth += 1;
    }

    None
}

/// (e) 会话的最后一条消息
pub fn by_last_message<H: PageHost>(host: &H, _reaction: &H::Node) -> Option<H::Node> {
    LAST_MESSAGE_SELECTORS
        .iter()
        .find_map(|selector| last_match(host, selector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Rect;
    use crate::parsers::html::HtmlPage;

    #[test]
    fn test_closest_ancestor_wins() {
        let page = HtmlPage::parse(
            r#"<div data-testid="msg-container" id="m"><div class="message-in" id="inner">
               <span id="r" data-testid="reaction">🇫🇷</span></div></div>"#,
        );
        let r = page.query("#r").unwrap();
        let (container, strategy) = find_message_container(&page, &r).unwrap();
        // msg-container 选择器优先于 .message-in
        assert_eq!(container, page.query("#m").unwrap());
        assert_eq!(strategy, ContainerStrategy::ClosestAncestor);
    }

    #[test]
    fn test_proximity_uses_threshold() {
        let mut page = HtmlPage::parse(
            r#"<div id="far"><span class="selectable-text">far</span></div>
               <div data-testid="message-row" id="near"><span class="selectable-text" id="t">near</span></div>
               <span id="r">🇩🇪</span>"#,
        );
        let r = page.query("#r").unwrap();
        let t = page.query("#t").unwrap();
        let far = page.query("#far .selectable-text").unwrap();
        page.set_bounding_rect(r, Rect::new(100.0, 300.0, 20.0, 20.0));
        page.set_bounding_rect(t, Rect::new(60.0, 200.0, 100.0, 20.0));
        page.set_bounding_rect(far, Rect::new(900.0, 10.0, 100.0, 20.0));

        assert_eq!(by_proximity(&page, &r), page.query("#near"));

        page.set_bounding_rect(t, Rect::new(300.0, 200.0, 100.0, 20.0));
        assert_eq!(by_proximity(&page, &r), None);
    }

    #[test]
    fn test_active_message_takes_last_match() {
        let page = HtmlPage::parse(
            r#"<div><div class="message-in" id="a"></div></div>
               <div><div class="message-out" id="b"></div></div>
               <span id="r"></span>"#,
        );
        let r = page.query("#r").unwrap();
        assert_eq!(by_active_message(&page, &r), page.query("#b"));
    }

    #[test]
    fn test_ancestor_context_depth_is_bounded() {
        let mut html = String::from(r#"<div id="top"><span class="selectable-text">x</span>"#);
        for _ in 0..12 {
            html.push_str("<div>");
        }
        html.push_str(r#"<span id="r"></span>"#);
        for _ in 0..12 {
            html.push_str("</div>");
        }
        html.push_str("</div>");

        let page = HtmlPage::parse(&html);
        let r = page.query("#r").unwrap();
        assert_eq!(by_ancestor_context(&page, &r), None);
    }

    #[test]
    fn test_ancestor_context_finds_text_marker() {
        let page = HtmlPage::parse(
            r#"<div id="wrap"><span class="copyable-text">hi</span><div><span id="r"></span></div></div>"#,
        );
        let r = page.query("#r").unwrap();
        assert_eq!(by_ancestor_context(&page, &r), page.query("#wrap"));
    }

    #[test]
    fn test_last_message_fallback() {
        let page = HtmlPage::parse(
            r#"<div data-testid="conversation-panel-messages"><div id="one"></div><div id="two"></div></div>
               <span id="r"></span>"#,
        );
        let r = page.query("#r").unwrap();
        // 策略 (a) 对会话面板的子元素同样生效，所以这里直接调用 (e)
        assert_eq!(by_last_message(&page, &r), page.query("#two"));
    }

    #[test]
    fn test_no_strategy_matches() {
        let page = HtmlPage::parse(r#"<div><span id="r">🇫🇷</span></div>"#);
        let r = page.query("#r").unwrap();
        assert_eq!(find_message_container(&page, &r), None);
    }
}
