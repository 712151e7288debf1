//! 翻译服务适配器
//!
//! 每个适配器只负责一个端点：发请求、映射状态码、解析响应。
//! 重试和回退由 [`super::client::TranslationClient`] 负责。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::translation::config::GoogleEndpoint;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    /// 端点全部失败后生成的占位文本，不是真正的译文
    pub placeholder: bool,
}

impl Translation {
    pub fn fetched(text: String) -> Self {
        Self {
            text,
            placeholder: false,
        }
    }

    pub fn placeholder(text: String) -> Self {
        Self {
            text,
            placeholder: true,
        }
    }
}

/// 翻译提供者
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 用于日志的名字，通常是端点地址
    fn name(&self) -> &str;

    /// 把文本翻译成目标语言
    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String>;

    /// 同 [`TranslationProvider::translate`]，但区分占位文本和真正的译文
    async fn translate_detailed(
        &self,
        text: &str,
        target_language: &str,
    ) -> TranslationResult<Translation> {
        self.translate(text, target_language)
            .await
            .map(Translation::fetched)
    }
}

/// 语言代码归一化为小写基础代码，`pt-BR` → `pt`
pub fn normalize_language(language: &str) -> String {
    language
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// 把非成功状态码映射为错误
fn status_error(status: StatusCode) -> TranslationError {
    match status.as_u16() {
        400 => TranslationError::HttpStatus {
            status: 400,
            message: "Bad Request - invalid parameters".to_string(),
        },
        429 => TranslationError::RateLimitExceeded,
        502 => TranslationError::HttpStatus {
            status: 502,
            message: "Bad Gateway - server temporarily unavailable".to_string(),
        },
        503 => TranslationError::HttpStatus {
            status: 503,
            message: "Service Unavailable - server overloaded".to_string(),
        },
        code => TranslationError::HttpStatus {
            status: code,
            message: status.canonical_reason().unwrap_or("error").to_string(),
        },
    }
}

// ============================================================================
// LibreTranslate
// ============================================================================

#[derive(Debug, Serialize)]
struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    /// 部分实例即使为空也要求带上这个字段
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibreTranslateResponse {
    translated_text: Option<String>,
}

/// 单个 LibreTranslate 实例
#[derive(Debug, Clone)]
pub struct LibreTranslateProvider {
    http: reqwest::Client,
    base_url: String,
}

impl LibreTranslateProvider {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TranslationProvider for LibreTranslateProvider {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        let target = normalize_language(target_language);
        let body = LibreTranslateRequest {
            q: text,
            source: "auto",
            target: &target,
            format: "text",
            api_key: "",
        };

        let response = self
            .http
            .post(format!("{}/translate", self.base_url))
            .json(&body)
            .send()
            .await?;

        tracing::debug!("{} 响应状态 {}", self.base_url, response.status());
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let data: LibreTranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::ParseError(e.to_string()))?;

        data.translated_text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                TranslationError::ParseError("no translatedText in response".to_string())
            })
    }
}

// ============================================================================
// DeepL
// ============================================================================

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

/// DeepL API
#[derive(Clone)]
pub struct DeepLProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for DeepLProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepLProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[configured]")
            .finish()
    }
}

impl DeepLProvider {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TranslationProvider for DeepLProvider {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        let params = [
            ("text", text.to_string()),
            ("target_lang", normalize_language(target_language).to_uppercase()),
        ];

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let data: DeepLResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::ParseError(e.to_string()))?;

        data.translations
            .into_iter()
            .next()
            .map(|translation| translation.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| TranslationError::ParseError("no translations in response".to_string()))
    }
}

// ============================================================================
// Google 备用端点
// ============================================================================

/// 嵌套数组里第一个字符串叶子
fn first_leaf_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text),
        Value::Array(items) => items.first().and_then(first_leaf_string),
        _ => None,
    }
}

/// 从 Google 响应里取出译文，支持嵌套数组和 `{sentences:[{trans}]}` 两种格式
pub fn parse_google_response(value: &Value) -> Option<String> {
    let text = match value {
        Value::Array(_) => first_leaf_string(value),
        Value::Object(_) => value
            .get("sentences")
            .and_then(|sentences| sentences.get(0))
            .and_then(|sentence| sentence.get("trans"))
            .and_then(Value::as_str),
        _ => None,
    }?;

    (!text.trim().is_empty()).then(|| text.to_string())
}

/// 免 key 的 Google 翻译端点
#[derive(Debug, Clone)]
pub struct GoogleFallbackProvider {
    http: reqwest::Client,
    endpoint: GoogleEndpoint,
}

impl GoogleFallbackProvider {
    pub fn new(http: reqwest::Client, endpoint: GoogleEndpoint) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl TranslationProvider for GoogleFallbackProvider {
    fn name(&self) -> &str {
        &self.endpoint.url
    }

    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        let target = normalize_language(target_language);
        let query = [
            ("client", self.endpoint.client.as_str()),
            ("sl", "auto"),
            ("tl", target.as_str()),
            ("dt", "t"),
            ("q", text),
        ];

        let response = self.http.get(&self.endpoint.url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| TranslationError::ParseError(e.to_string()))?;

        parse_google_response(&data).ok_or_else(|| {
            TranslationError::ParseError("unrecognized Google response format".to_string())
        })
    }
}
