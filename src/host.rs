//! 宿主页面能力接口
//!
//! 检测与翻译逻辑只通过 [`PageHost`] 访问页面，这样同一套启发式规则
//! 可以跑在真实浏览器 DOM、保存下来的 HTML 页面或测试替身上。

use std::fmt;
use std::hash::Hash;

/// 本 crate 渲染的浮层都带有这个 class
pub const OVERLAY_CLASS: &str = "flag-translation";

/// 匹配浮层的选择器
pub const OVERLAY_SELECTOR: &str = ".flag-translation";

/// 元素在屏幕上的位置（CSS 像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// 左上角之间的曼哈顿距离
    pub fn corner_distance(&self, other: &Rect) -> f64 {
        (self.top - other.top).abs() + (self.left - other.left).abs()
    }
}

/// 浮层种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Loading,
    Result,
    Error,
}

impl OverlayKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            OverlayKind::Loading => "loading",
            OverlayKind::Result => "result",
            OverlayKind::Error => "error",
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            OverlayKind::Loading => "Translating...",
            OverlayKind::Result => "Auto-translated",
            OverlayKind::Error => "Error",
        }
    }
}

/// 要挂到消息容器上的浮层内容
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub id: u64,
    pub kind: OverlayKind,
    /// 显示在标题栏的国旗，`None` 表示不显示
    pub flag: Option<String>,
    pub text: String,
    /// 字号百分比
    pub bubble_size: u32,
}

impl Overlay {
    /// 是否带关闭按钮
    pub fn closable(&self) -> bool {
        self.kind != OverlayKind::Loading
    }
}

/// 宿主页面提供的最小能力集合
///
/// 查询全部是只读的，唯一的写操作是在消息容器下添加或移除浮层。
pub trait PageHost {
    type Node: Clone + Eq + Hash + fmt::Debug;

    /// 文档根元素
    fn document(&self) -> Self::Node;

    /// `scope` 之下（不含自身）匹配选择器的元素，按文档顺序
    fn select_all(&self, scope: &Self::Node, selector: &str) -> Vec<Self::Node>;

    /// 元素本身是否匹配选择器
    fn matches(&self, node: &Self::Node, selector: &str) -> bool;

    /// 父元素
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// 子元素（仅元素节点）
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn attr(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// 小写标签名
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    /// 全部后代文本，跳过本 crate 渲染的浮层
    fn text_content(&self, node: &Self::Node) -> String;

    /// 只取直接子文本节点
    fn own_text(&self, node: &Self::Node) -> String;

    /// 内部 HTML，同样跳过浮层
    fn inner_html(&self, node: &Self::Node) -> String;

    /// 没有布局信息时返回 `None`
    fn bounding_rect(&self, node: &Self::Node) -> Option<Rect>;

    /// 在容器下追加浮层
    fn render_overlay(&mut self, container: &Self::Node, overlay: &Overlay) -> bool;

    /// 移除容器下已有的浮层，返回是否移除了任何节点
    fn remove_overlay(&mut self, container: &Self::Node) -> bool;

    fn select_first(&self, scope: &Self::Node, selector: &str) -> Option<Self::Node> {
        self.select_all(scope, selector).into_iter().next()
    }

    /// 整个文档范围内查询
    fn query_all(&self, selector: &str) -> Vec<Self::Node> {
        self.select_all(&self.document(), selector)
    }

    fn query(&self, selector: &str) -> Option<Self::Node> {
        self.select_first(&self.document(), selector)
    }

    /// 自身或最近的匹配祖先
    fn closest(&self, node: &Self::Node, selector: &str) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.matches(&candidate, selector) {
                return Some(candidate);
            }
            current = self.parent(&candidate);
        }
        None
    }

    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        let siblings = self.children(&parent);
        let index = siblings.iter().position(|sibling| sibling == node)?;
        index.checked_sub(1).map(|i| siblings[i].clone())
    }

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        let siblings = self.children(&parent);
        let index = siblings.iter().position(|sibling| sibling == node)?;
        siblings.get(index + 1).cloned()
    }

    /// 节点位于本 crate 渲染的浮层内部
    fn is_inside_overlay(&self, node: &Self::Node) -> bool {
        self.closest(node, OVERLAY_SELECTOR).is_some()
    }
}
