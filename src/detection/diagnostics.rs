//! 离线诊断
//!
//! 列出页面上所有带国旗的元素，并解释单个节点的检测结果。

use crate::flags::{contains_regional_indicator_pair, decode_all_flags, decode_flag, flag_to_language};
use crate::host::PageHost;
use crate::translation::pipeline::{extract_message_text, message_id};

use super::association::{find_message_container, ContainerStrategy};
use super::reaction::{extract_flag, is_reaction};

/// 页面上带有区域指示符号对的元素
#[derive(Debug, Clone, PartialEq)]
pub struct FlagElement<N> {
    pub node: N,
    /// 形如 `button#id.class[data-testid=..]` 的简短描述
    pub description: String,
    /// 已识别的国旗，可能为空（只有未知的符号对）
    pub flags: Vec<&'static str>,
}

/// 单个节点的诊断报告
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis<N> {
    pub description: String,
    pub is_reaction: bool,
    pub flag: Option<&'static str>,
    pub language: Option<&'static str>,
    pub container: Option<(N, ContainerStrategy)>,
    pub message_id: Option<String>,
    pub message_text: Option<String>,
}

/// 生成元素的简短描述
pub fn describe<H: PageHost>(host: &H, node: &H::Node) -> String {
    let mut description = host.tag_name(node).unwrap_or_else(|| "?".to_string());

    if let Some(id) = host.attr(node, "id").filter(|id| !id.is_empty()) {
        description.push('#');
        description.push_str(&id);
    }
    if let Some(class) = host.attr(node, "class") {
        for name in class.split_whitespace().take(3) {
            description.push('.');
            description.push_str(name);
        }
    }
    if let Some(test_id) = host.attr(node, "data-testid") {
        description.push_str(&format!("[data-testid=\"{}\"]", test_id));
    }

    description
}

/// 查找所有在 aria-label、title 或直接文本中带国旗的元素
pub fn find_all_flags<H: PageHost>(host: &H) -> Vec<FlagElement<H::Node>> {
    host.query_all("*")
        .into_iter()
        .filter(|node| !host.is_inside_overlay(node))
        .filter_map(|node| {
            let sources: Vec<String> = ["aria-label", "title"]
                .iter()
                .filter_map(|name| host.attr(&node, name))
                .chain(std::iter::once(host.own_text(&node)))
                .filter(|text| contains_regional_indicator_pair(text))
                .collect();

            if sources.is_empty() {
                return None;
            }

            let mut flags: Vec<&'static str> = Vec::new();
            for flag in sources.iter().flat_map(|text| decode_all_flags(text)) {
                if !flags.contains(&flag) {
                    flags.push(flag);
                }
            }

            Some(FlagElement {
                description: describe(host, &node),
                node,
                flags,
            })
        })
        .collect()
}

/// 解释一个节点会被怎样处理
pub fn diagnose<H: PageHost>(host: &H, node: &H::Node) -> Diagnosis<H::Node> {
    let flag = extract_flag(host, node).or_else(|| decode_flag(&host.text_content(node)));
    let language = flag.and_then(flag_to_language);
    let container = find_message_container(host, node);

    let (message_id, message_text) = match &container {
        Some((container, _)) => {
            let text = extract_message_text(host, container);
            (Some(message_id(host, container, &text)), Some(text))
        }
        None => (None, None),
    };

    Diagnosis {
        description: describe(host, node),
        is_reaction: is_reaction(host, node),
        flag,
        language,
        container,
        message_id,
        message_text,
    }
}
