use std::cell::RefCell;
use std::collections::HashMap;

use ego_tree::{NodeId, NodeRef, Tree};
use encoding_rs::Encoding;
use scraper::{ElementRef, Html, Node, Selector};

use crate::host::{Overlay, PageHost, Rect, OVERLAY_CLASS, OVERLAY_SELECTOR};

use super::utils::overlay_markup;

/// 基于 html5ever 解析结果的宿主页面
///
/// 用于离线处理保存下来的聊天页面，也是测试里的主要宿主实现。
/// 没有布局引擎，元素位置需要通过 [`HtmlPage::set_bounding_rect`] 提供。
pub struct HtmlPage {
    html: Html,
    layout: HashMap<NodeId, Rect>,
    selectors: RefCell<HashMap<String, Option<Selector>>>,
}

/// 将 HTML 字节转换为页面
pub fn html_to_page(data: &[u8], document_encoding: &str) -> HtmlPage {
    let s: String = if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        string.into_owned()
    } else {
        String::from_utf8_lossy(data).into_owned()
    };

    HtmlPage::parse(&s)
}

impl HtmlPage {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
            layout: HashMap::new(),
            selectors: RefCell::new(HashMap::new()),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// 为元素提供布局信息
    pub fn set_bounding_rect(&mut self, node: NodeId, rect: Rect) {
        self.layout.insert(node, rect);
    }

    /// 解析一段 HTML 并追加到 `parent` 下，返回新增的顶层元素
    ///
    /// 用来回放页面的 childList 变化。
    pub fn insert_html(&mut self, parent: NodeId, fragment: &str) -> Vec<NodeId> {
        let parsed = Html::parse_fragment(fragment);
        let mut added = Vec::new();

        for source in parsed.root_element().children() {
            if let Some(id) = graft(&mut self.html.tree, parent, source) {
                if source.value().is_element() {
                    added.push(id);
                }
            }
        }

        added
    }

    fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    fn selector(&self, selector: &str) -> Option<Selector> {
        let mut cache = self.selectors.borrow_mut();
        cache
            .entry(selector.to_string())
            .or_insert_with(|| match Selector::parse(selector) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::debug!("无效的选择器 {}: {:?}", selector, e);
                    None
                }
            })
            .clone()
    }
}

/// 把另一棵树中的节点（连同子树）复制到 `parent` 下
fn graft(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) -> Option<NodeId> {
    let id = tree.get_mut(parent)?.append(source.value().clone()).id();
    for child in source.children() {
        graft(tree, id, child);
    }
    Some(id)
}

fn is_overlay(node: &NodeRef<'_, Node>) -> bool {
    match node.value() {
        Node::Element(element) => element.classes().any(|class| class == OVERLAY_CLASS),
        _ => false,
    }
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) if is_overlay(&child) => {}
            Node::Element(_) => collect_text(child, out),
            _ => {}
        }
    }
}

impl PageHost for HtmlPage {
    type Node = NodeId;

    fn document(&self) -> NodeId {
        self.html.root_element().id()
    }

    fn select_all(&self, scope: &NodeId, selector: &str) -> Vec<NodeId> {
        let (Some(selector), Some(scope)) = (self.selector(selector), self.element(*scope)) else {
            return Vec::new();
        };
        scope.select(&selector).map(|element| element.id()).collect()
    }

    fn matches(&self, node: &NodeId, selector: &str) -> bool {
        match (self.selector(selector), self.element(*node)) {
            (Some(selector), Some(element)) => selector.matches(&element),
            _ => false,
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.html
            .tree
            .get(*node)?
            .parent()
            .and_then(ElementRef::wrap)
            .map(|element| element.id())
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        match self.html.tree.get(*node) {
            Some(node) => node
                .children()
                .filter_map(ElementRef::wrap)
                .map(|element| element.id())
                .collect(),
            None => Vec::new(),
        }
    }

    fn attr(&self, node: &NodeId, name: &str) -> Option<String> {
        self.element(*node)?.value().attr(name).map(str::to_string)
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        self.element(*node)
            .map(|element| element.value().name().to_ascii_lowercase())
    }

    fn text_content(&self, node: &NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.html.tree.get(*node) {
            collect_text(node, &mut out);
        }
        out
    }

    fn own_text(&self, node: &NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.html.tree.get(*node) {
            for child in node.children() {
                if let Node::Text(text) = child.value() {
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// 内部 HTML，不含浮层子树
    fn inner_html(&self, node: &NodeId) -> String {
        let Some(element) = self.element(*node) else {
            return String::new();
        };

        let mut html = element.inner_html();
        if let Some(selector) = self.selector(OVERLAY_SELECTOR) {
            for overlay in element.select(&selector) {
                html = html.replace(&overlay.html(), "");
            }
        }
        html
    }

    fn bounding_rect(&self, node: &NodeId) -> Option<Rect> {
        self.layout.get(node).copied()
    }

    fn render_overlay(&mut self, container: &NodeId, overlay: &Overlay) -> bool {
        if self.element(*container).is_none() {
            return false;
        }

        let parsed = Html::parse_fragment(&overlay_markup(overlay));
        let mut rendered = false;
        for source in parsed.root_element().children() {
            rendered |= graft(&mut self.html.tree, *container, source).is_some();
        }
        rendered
    }

    fn remove_overlay(&mut self, container: &NodeId) -> bool {
        let existing: Vec<NodeId> = self
            .select_all(container, OVERLAY_SELECTOR)
            .into_iter()
            .filter(|id| self.parent(id).as_ref() == Some(container))
            .collect();

        for id in &existing {
            if let Some(mut node) = self.html.tree.get_mut(*id) {
                node.detach();
            }
        }

        !existing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OverlayKind;

    const PAGE: &str = r#"<html><body><div id="main">
        <div data-testid="msg-container" data-id="m1"><span class="selectable-text">Hello <b>there</b></span></div>
    </div></body></html>"#;

    #[test]
    fn test_select_and_attributes() {
        let page = HtmlPage::parse(PAGE);
        let container = page.query("[data-testid=\"msg-container\"]").unwrap();
        assert_eq!(page.attr(&container, "data-id").as_deref(), Some("m1"));
        assert_eq!(page.tag_name(&container).as_deref(), Some("div"));

        let span = page.select_first(&container, ".selectable-text").unwrap();
        assert_eq!(page.text_content(&span), "Hello there");
        assert_eq!(page.own_text(&span), "Hello ");
        assert_eq!(page.parent(&span), Some(container));
        assert_eq!(page.closest(&span, "#main"), page.query("#main"));
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let page = HtmlPage::parse(PAGE);
        assert!(page.query_all("[[[").is_empty());
        assert!(!page.matches(&page.document(), "[[["));
    }

    #[test]
    fn test_overlay_is_replaceable_and_hidden_from_text() {
        let mut page = HtmlPage::parse(PAGE);
        let container = page.query("[data-testid=\"msg-container\"]").unwrap();
        let overlay = Overlay {
            id: 7,
            kind: OverlayKind::Result,
            flag: Some("🇫🇷".to_string()),
            text: "Bonjour <là>".to_string(),
            bubble_size: 100,
        };

        assert!(page.render_overlay(&container, &overlay));
        assert_eq!(page.select_all(&container, ".flag-translation").len(), 1);
        assert!(page.serialize_html().contains("Bonjour &lt;là&gt;"));
        assert_eq!(page.text_content(&container).trim(), "Hello there");

        assert!(!page.inner_html(&container).contains("🇫🇷"));
        assert!(!page.inner_html(&container).contains("Bonjour"));
        assert!(page.inner_html(&container).contains("Hello <b>there</b>"));

        assert!(page.remove_overlay(&container));
        assert!(page.select_all(&container, ".flag-translation").is_empty());
        assert!(!page.remove_overlay(&container));
    }

    #[test]
    fn test_insert_html_returns_new_elements() {
        let mut page = HtmlPage::parse(PAGE);
        let main = page.query("#main").unwrap();
        let added = page.insert_html(main, "<div class=\"a\"></div>text<span class=\"b\"></span>");
        assert_eq!(added.len(), 2);
        assert!(page.matches(&added[0], ".a"));
        assert!(page.matches(&added[1], ".b"));
    }

    #[test]
    fn test_decodes_declared_charset() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("<p>café</p>");
        let page = html_to_page(&bytes, "windows-1252");
        let p = page.query("p").unwrap();
        assert_eq!(page.text_content(&p), "café");
    }
}
