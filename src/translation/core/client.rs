//! 带回退链的翻译客户端

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::providers::{
    normalize_language, DeepLProvider, GoogleFallbackProvider, LibreTranslateProvider,
    Translation, TranslationProvider,
};
use crate::translation::config::{constants, ExhaustedPolicy, ServiceKind, Settings, TranslatorConfig};
use crate::translation::error::{helpers::config_error, TranslationError, TranslationResult};

/// 依次尝试各个端点，只在全部失败后报告一次聚合错误
pub struct TranslationClient {
    primary: Vec<Arc<dyn TranslationProvider>>,
    fallback: Vec<Arc<dyn TranslationProvider>>,
    endpoint_delay: Duration,
    request_timeout: Duration,
    on_exhausted: ExhaustedPolicy,
}

impl std::fmt::Debug for TranslationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationClient")
            .field("primary", &self.primary.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("fallback", &self.fallback.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("endpoint_delay", &self.endpoint_delay)
            .field("request_timeout", &self.request_timeout)
            .field("on_exhausted", &self.on_exhausted)
            .finish()
    }
}

impl TranslationClient {
    /// 用给定的提供者构建客户端
    pub fn with_providers(
        primary: Vec<Arc<dyn TranslationProvider>>,
        fallback: Vec<Arc<dyn TranslationProvider>>,
    ) -> Self {
        Self {
            primary,
            fallback,
            endpoint_delay: constants::DEFAULT_ENDPOINT_DELAY,
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
            on_exhausted: ExhaustedPolicy::Fail,
        }
    }

    /// 按用户设置和部署配置构建端点链
    ///
    /// 选择了 DeepL 却没有 API key 时返回配置错误。
    pub fn from_config(
        settings: &Settings,
        config: &TranslatorConfig,
        api_key: Option<&str>,
    ) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| TranslationError::InternalError(format!("HTTP client: {}", e)))?;

        let primary: Vec<Arc<dyn TranslationProvider>> = match settings.translation_service {
            ServiceKind::DeepL => {
                let key = api_key
                    .or(config.deepl_api_key.as_deref())
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| config_error("DeepL API key not configured"))?;
                vec![Arc::new(DeepLProvider::new(
                    http.clone(),
                    config.deepl_endpoint.as_str(),
                    key,
                )) as Arc<dyn TranslationProvider>]
            }
            ServiceKind::LibreTranslate => config
                .libretranslate_instances
                .iter()
                .map(|url| {
                    Arc::new(LibreTranslateProvider::new(http.clone(), url.as_str()))
                        as Arc<dyn TranslationProvider>
                })
                .collect(),
        };

        let fallback = config
            .google_endpoints
            .iter()
            .map(|endpoint| {
                Arc::new(GoogleFallbackProvider::new(http.clone(), endpoint.clone()))
                    as Arc<dyn TranslationProvider>
            })
            .collect();

        tracing::info!(
            "翻译客户端已构建: {}，{} 个主端点，{} 个备用端点",
            settings.translation_service,
            primary.len(),
            config.google_endpoints.len()
        );

        Ok(Self::with_providers(primary, fallback)
            .with_endpoint_delay(config.endpoint_delay())
            .with_request_timeout(config.request_timeout())
            .with_exhausted_policy(config.on_exhausted))
    }

    pub fn with_endpoint_delay(mut self, delay: Duration) -> Self {
        self.endpoint_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_exhausted_policy(mut self, policy: ExhaustedPolicy) -> Self {
        self.on_exhausted = policy;
        self
    }

    /// 端点总数
    pub fn endpoint_count(&self) -> usize {
        self.primary.len() + self.fallback.len()
    }

    async fn attempt(
        &self,
        provider: &dyn TranslationProvider,
        text: &str,
        target_language: &str,
    ) -> TranslationResult<String> {
        tracing::debug!("尝试端点: {}", provider.name());
        tokio::time::timeout(self.request_timeout, provider.translate(text, target_language))
            .await?
    }

    /// 翻译文本，按主端点、备用端点、耗尽策略的顺序处理
    pub async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        self.translate_detailed(text, target_language)
            .await
            .map(|translation| translation.text)
    }

    /// 同 [`TranslationClient::translate`]，占位文本会被标记出来
    pub async fn translate_detailed(
        &self,
        text: &str,
        target_language: &str,
    ) -> TranslationResult<Translation> {
        let target = normalize_language(target_language);
        let mut last_error: Option<TranslationError> = None;
        let mut attempts = 0usize;

        let chain = self
            .primary
            .iter()
            .enumerate()
            .map(|(index, provider)| (index > 0, provider))
            .chain(self.fallback.iter().map(|provider| (false, provider)));

        for (spaced, provider) in chain {
            if spaced && !self.endpoint_delay.is_zero() {
                tokio::time::sleep(self.endpoint_delay).await;
            }

            attempts += 1;
            match self.attempt(provider.as_ref(), text, &target).await {
                Ok(translation) => {
                    tracing::info!("翻译成功: {}", provider.name());
                    return Ok(Translation::fetched(translation));
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!("端点 {} 失败（{:?}）: {}", provider.name(), e.category(), e);
                    } else {
                        tracing::error!("端点 {} 不可用（{:?}）: {}", provider.name(), e.category(), e);
                    }
                    last_error = Some(e.with_context(provider.name()));
                }
            }
        }

        let summary = match last_error {
            Some(e) => format!("{} endpoints tried, last error: {}", attempts, e),
            None => "no endpoints configured".to_string(),
        };

        match self.on_exhausted {
            ExhaustedPolicy::Fail => {
                tracing::error!("所有翻译服务都失败了: {}", summary);
                Err(TranslationError::Exhausted(summary))
            }
            ExhaustedPolicy::Placeholder => {
                tracing::warn!("所有翻译服务都失败了，返回占位文本: {}", summary);
                Ok(Translation::placeholder(format!(
                    "[untranslated → {}] {}",
                    target_language, text
                )))
            }
        }
    }
}

#[async_trait]
impl TranslationProvider for TranslationClient {
    fn name(&self) -> &str {
        "chain"
    }

    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        TranslationClient::translate(self, text, target_language).await
    }

    async fn translate_detailed(
        &self,
        text: &str,
        target_language: &str,
    ) -> TranslationResult<Translation> {
        TranslationClient::translate_detailed(self, text, target_language).await
    }
}
