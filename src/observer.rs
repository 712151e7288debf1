//! 页面变化观察层
//!
//! 宿主把 DOM 变化整理成 [`MutationRecord`] 交给观察层，观察层挑出值得
//! 检测的节点。挂载时按优先级寻找聊天区域，找不到就按退避间隔重试，
//! 超过次数后退回整个 body。

use std::cell::RefCell;
use std::time::Duration;

use crate::detection::MESSAGE_CONTAINER_SELECTOR;
use crate::host::PageHost;
use crate::translation::config::{constants, TranslatorConfig};

/// 聊天区域选择器，按优先级排列
pub const CHAT_SELECTORS: &[&str] = &[
    "[data-testid=\"conversation-panel-messages\"]",
    "#main .copyable-area",
    "#main [data-testid=\"conversation-panel\"]",
    "#main .message-list",
    "#main [role=\"application\"]",
    "#main",
];

/// 单条消息的选择器
pub const MESSAGE_SELECTOR: &str = MESSAGE_CONTAINER_SELECTOR;

/// 会影响回应识别的属性
pub const WATCHED_ATTRIBUTES: &[&str] = &["class", "data-testid", "title", "aria-label"];

/// 变化类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes { name: String },
}

/// 一条 DOM 变化记录
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord<N> {
    pub target: N,
    pub added_nodes: Vec<N>,
    pub kind: MutationKind,
}

impl<N> MutationRecord<N> {
    pub fn child_list(target: N, added_nodes: Vec<N>) -> Self {
        Self {
            target,
            added_nodes,
            kind: MutationKind::ChildList,
        }
    }

    pub fn attribute(target: N, name: impl Into<String>) -> Self {
        Self {
            target,
            added_nodes: Vec::new(),
            kind: MutationKind::Attributes { name: name.into() },
        }
    }
}

/// 聊天区域观察器
#[derive(Debug)]
pub struct ChatObserver<N> {
    root: Option<N>,
    fallback: bool,
    max_attempts: u32,
    backoff: Duration,
}

impl<N> ChatObserver<N>
where
    N: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            root: None,
            fallback: false,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self::new(config.attach_max_attempts, config.attach_backoff())
    }

    /// 按优先级查找聊天区域
    pub fn find_chat_container<H>(host: &H) -> Option<(N, &'static str)>
    where
        H: PageHost<Node = N>,
    {
        CHAT_SELECTORS
            .iter()
            .find_map(|selector| host.query(selector).map(|node| (node, *selector)))
    }

    /// 挂载到聊天区域，必要时重试
    ///
    /// 每次尝试只在同步片段内借用宿主。全部失败后观察 body，
    /// 没有 body 时观察文档根。
    pub async fn attach<H>(&mut self, host: &RefCell<H>) -> N
    where
        H: PageHost<Node = N>,
    {
        if let Some(root) = &self.root {
            return root.clone();
        }

        for attempt in 1..=self.max_attempts {
            let found = Self::find_chat_container(&*host.borrow());
            if let Some((container, selector)) = found {
                tracing::info!("找到聊天区域: {}", selector);
                self.root = Some(container.clone());
                self.fallback = false;
                return container;
            }

            if attempt < self.max_attempts {
                tracing::debug!(
                    "未找到聊天区域（{}/{}），{:?} 后重试",
                    attempt,
                    self.max_attempts,
                    self.backoff
                );
                tokio::time::sleep(self.backoff).await;
            }
        }

        let root = {
            let host = host.borrow();
            host.query("body").unwrap_or_else(|| host.document())
        };
        tracing::warn!("达到最大尝试次数，改为观察整个 body");
        self.root = Some(root.clone());
        self.fallback = true;
        root
    }

    pub fn root(&self) -> Option<&N> {
        self.root.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.root.is_some()
    }

    /// 是否退回到了 body
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn disconnect(&mut self) {
        if self.root.take().is_some() {
            tracing::info!("观察器已断开");
        }
        self.fallback = false;
    }

    /// 根节点下已有的消息
    pub fn existing_messages<H>(&self, host: &H) -> Vec<N>
    where
        H: PageHost<Node = N>,
    {
        match &self.root {
            Some(root) => host.select_all(root, MESSAGE_SELECTOR),
            None => Vec::new(),
        }
    }

    /// 从一批变化里挑出需要检测的节点
    ///
    /// 新增节点必须在根节点之内。目标节点只有位于某条消息内时才检测，
    /// childList 变化要求至少新增了一个浮层以外的节点，属性变化要求属性名
    /// 在关注列表里。浮层内部的变化全部忽略。
    pub fn relevant_nodes<H>(&self, host: &H, records: &[MutationRecord<N>]) -> Vec<N>
    where
        H: PageHost<Node = N>,
    {
        let Some(root) = &self.root else {
            return Vec::new();
        };

        let mut nodes: Vec<N> = Vec::new();
        let mut push = |node: &N| {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        };

        for record in records {
            let target_watched = match &record.kind {
                MutationKind::ChildList => {
                    let mut page_content_added = false;
                    for added in &record.added_nodes {
                        if host.is_inside_overlay(added) {
                            continue;
                        }
                        page_content_added = true;
                        if is_within(host, added, root) {
                            push(added);
                        }
                    }
                    // 只增删浮层的变化来自本 crate 自己
                    page_content_added
                }
                MutationKind::Attributes { name } => WATCHED_ATTRIBUTES.contains(&name.as_str()),
            };

            if target_watched
                && !host.is_inside_overlay(&record.target)
                && host.closest(&record.target, MESSAGE_SELECTOR).is_some()
            {
                push(&record.target);
            }
        }

        nodes
    }
}

impl<N> Default for ChatObserver<N>
where
    N: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new(constants::ATTACH_MAX_ATTEMPTS, constants::ATTACH_BACKOFF)
    }
}

/// `node` 是否是 `ancestor` 本身或其后代
fn is_within<H: PageHost>(host: &H, node: &H::Node, ancestor: &H::Node) -> bool {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if &candidate == ancestor {
            return true;
        }
        current = host.parent(&candidate);
    }
    false
}
