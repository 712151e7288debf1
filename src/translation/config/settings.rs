//! 用户设置
//!
//! 由外部设置界面写入存储，字段名使用 camelCase 以保持存储格式兼容。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 首选翻译服务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum ServiceKind {
    #[default]
    #[serde(rename = "libretranslate")]
    LibreTranslate,
    #[serde(rename = "deepl")]
    DeepL,
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "libretranslate" | "libre" => Ok(ServiceKind::LibreTranslate),
            "deepl" => Ok(ServiceKind::DeepL),
            other => Err(format!(
                "Unknown translation service '{}'. Use: libretranslate, deepl",
                other
            )),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::LibreTranslate => write!(f, "libretranslate"),
            ServiceKind::DeepL => write!(f, "deepl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// 结果浮层显示秒数
    pub duration: u64,
    /// 浮层字号百分比
    pub bubble_size: u32,
    pub auto_hide: bool,
    pub show_flag: bool,
    pub compress_text: bool,
    pub cache_translations: bool,
    pub debug_mode: bool,
    pub translation_service: ServiceKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            duration: 120,
            bubble_size: 100,
            auto_hide: true,
            show_flag: true,
            compress_text: true,
            cache_translations: true,
            debug_mode: false,
            translation_service: ServiceKind::LibreTranslate,
        }
    }
}

impl Settings {
    /// 结果浮层的存活时间，`None` 表示一直显示到手动关闭
    pub fn result_ttl(&self) -> Option<Duration> {
        (self.auto_hide && self.duration > 0).then(|| Duration::from_secs(self.duration))
    }

    /// 合并部分更新
    pub fn apply(&mut self, partial: PartialSettings) {
        if let Some(duration) = partial.duration {
            self.duration = duration;
        }
        if let Some(bubble_size) = partial.bubble_size {
            self.bubble_size = bubble_size;
        }
        if let Some(auto_hide) = partial.auto_hide {
            self.auto_hide = auto_hide;
        }
        if let Some(show_flag) = partial.show_flag {
            self.show_flag = show_flag;
        }
        if let Some(compress_text) = partial.compress_text {
            self.compress_text = compress_text;
        }
        if let Some(cache_translations) = partial.cache_translations {
            self.cache_translations = cache_translations;
        }
        if let Some(debug_mode) = partial.debug_mode {
            self.debug_mode = debug_mode;
        }
        if let Some(service) = partial.translation_service {
            self.translation_service = service;
        }
    }
}

/// `settingsUpdated` 消息携带的部分设置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bubble_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_hide: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_flag: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_translations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_service: Option<ServiceKind>,
}
