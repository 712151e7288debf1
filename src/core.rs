//! 页面上下文
//!
//! [`FlagTranslator`] 持有一个页面挂载期间的全部状态：宿主页面、设置存储、
//! 翻译服务和观察器。挂载时创建，断开时清空。

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::detection::{detect, find_candidates};
use crate::env::{core::Debug as DebugMode, EnvVar};
use crate::host::PageHost;
use crate::observer::{ChatObserver, MutationRecord};
use crate::translation::config::{PartialSettings, Settings, SettingsStore, TranslatorConfig};
use crate::translation::core::{
    ClientSlot, ReactionOutcome, ReactionRequest, TranslationClient, TranslationProvider,
    TranslationService,
};
use crate::translation::error::TranslationError;
use crate::translation::pipeline::{extract_message_text, is_translatable, message_id};
use crate::translation::storage::CacheKey;

/// 设置界面发来的运行时消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RuntimeMessage {
    Ping,
    ApiKeyUpdated,
    SettingsUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<PartialSettings>,
    },
}

/// 对运行时消息的回复
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeReply {
    pub status: String,
}

impl RuntimeReply {
    pub fn active() -> Self {
        Self {
            status: "active".to_string(),
        }
    }
}

/// 单个页面的翻译上下文
pub struct FlagTranslator<H: PageHost, S> {
    host: RefCell<H>,
    store: S,
    config: TranslatorConfig,
    service: TranslationService<H::Node>,
    observer: ChatObserver<H::Node>,
    provider_override: Option<Arc<dyn TranslationProvider>>,
    env_debug: bool,
    initialized: bool,
}

impl<H, S> FlagTranslator<H, S>
where
    H: PageHost,
    S: SettingsStore,
{
    pub fn new(host: H, store: S, config: TranslatorConfig) -> Self {
        let observer = ChatObserver::from_config(&config);
        Self {
            host: RefCell::new(host),
            store,
            config,
            service: TranslationService::new(
                Settings::default(),
                Err(TranslationError::ConfigError(
                    "translator not initialized".to_string(),
                )),
            ),
            observer,
            provider_override: None,
            env_debug: DebugMode::get_or_default(false),
            initialized: false,
        }
    }

    /// 用指定的提供者代替按设置构建的端点链
    pub fn with_provider(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.provider_override = Some(provider);
        self
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.host.borrow_mut()
    }

    pub fn into_host(self) -> H {
        self.host.into_inner()
    }

    pub fn service(&self) -> &TranslationService<H::Node> {
        &self.service
    }

    pub fn observer(&self) -> &ChatObserver<H::Node> {
        &self.observer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn debug_enabled(&self) -> bool {
        self.env_debug || self.service.settings().debug_mode
    }

    // ========================================================================
    // 生命周期
    // ========================================================================

    /// 加载设置、构建客户端、挂载观察器并扫描已有消息
    ///
    /// 重复调用不会做任何事。返回已有消息上回应的处理结果。
    pub async fn init(&mut self) -> Vec<ReactionOutcome> {
        if self.initialized {
            tracing::debug!("已经初始化，跳过");
            return Vec::new();
        }

        tracing::info!("🚀 初始化国旗翻译器");
        self.reload_settings();
        self.rebuild_client();

        self.observer.attach(&self.host).await;
        self.initialized = true;
        tracing::info!("✅ 观察器已挂载");

        self.scan_existing().await
    }

    /// 断开观察器并清空缓存、进行中集合和浮层账本
    pub fn disconnect(&mut self) {
        self.observer.disconnect();
        self.service.clear();
        self.initialized = false;
        tracing::info!("国旗翻译器已断开");
    }

    fn reload_settings(&self) {
        let settings = match self.store.load_settings() {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!("⚠️ 读取设置失败，使用默认值: {}", e);
                Settings::default()
            }
        };
        tracing::debug!("设置: {:?}", settings);
        self.service.update_settings(settings);
    }

    fn load_api_key(&self) -> Option<String> {
        self.store.load_api_key().unwrap_or_else(|e| {
            tracing::warn!("⚠️ 读取 API key 失败: {}", e);
            None
        })
    }

    /// 按当前设置和 API key 重建翻译客户端
    fn rebuild_client(&self) {
        let slot: ClientSlot = match &self.provider_override {
            Some(provider) => Ok(provider.clone()),
            None => TranslationClient::from_config(
                &self.service.settings(),
                &self.config,
                self.load_api_key().as_deref(),
            )
            .map(|client| Arc::new(client) as Arc<dyn TranslationProvider>),
        };
        self.service.set_client(slot);
    }

    // ========================================================================
    // 运行时消息
    // ========================================================================

    /// 处理设置界面发来的消息，只有 `ping` 需要回复
    pub fn handle_message(&self, message: RuntimeMessage) -> Option<RuntimeReply> {
        match message {
            RuntimeMessage::Ping => Some(RuntimeReply::active()),
            RuntimeMessage::ApiKeyUpdated => {
                self.rebuild_client();
                tracing::info!("🔑 API key 已重新加载");
                None
            }
            RuntimeMessage::SettingsUpdated { data } => {
                match data {
                    Some(partial) => {
                        let mut settings = self.service.settings();
                        settings.apply(partial);
                        self.service.update_settings(settings);
                    }
                    None => self.reload_settings(),
                }
                self.rebuild_client();
                tracing::info!("⚙️ 设置已更新");
                None
            }
        }
    }

    /// 解析并处理 JSON 形式的消息
    pub fn handle_message_json(&self, raw: &str) -> Result<Option<RuntimeReply>, TranslationError> {
        let message: RuntimeMessage = serde_json::from_str(raw)?;
        Ok(self.handle_message(message))
    }

    // ========================================================================
    // 检测与分发
    // ========================================================================

    /// 处理一批页面变化
    pub async fn on_mutations(&self, records: &[MutationRecord<H::Node>]) -> Vec<ReactionOutcome> {
        if !self.initialized {
            return Vec::new();
        }

        let requests = {
            let host = self.host.borrow();
            let nodes = self.observer.relevant_nodes(&*host, records);
            if self.debug_enabled() {
                tracing::info!("👀 {} 条变化，{} 个待检测节点", records.len(), nodes.len());
            }
            self.collect_requests(&*host, &nodes)
        };

        self.dispatch(requests).await
    }

    /// 扫描观察根节点下已有的消息
    pub async fn scan_existing(&self) -> Vec<ReactionOutcome> {
        let requests = {
            let host = self.host.borrow();
            let messages = self.observer.existing_messages(&*host);
            tracing::debug!("扫描 {} 条已有消息", messages.len());
            self.collect_requests(&*host, &messages)
        };

        self.dispatch(requests).await
    }

    /// 同一批次内，同一容器上的同一段文本和语言只保留一个请求
    fn collect_requests(&self, host: &H, roots: &[H::Node]) -> Vec<ReactionRequest<H::Node>> {
        let debug = self.debug_enabled();
        let mut requests = Vec::new();
        let mut seen: HashSet<(H::Node, CacheKey)> = HashSet::new();

        for root in roots {
            for candidate in find_candidates(host, root) {
                let Some(event) = detect(host, &candidate) else {
                    if debug {
                        tracing::info!("未识别的回应候选: {:?}", candidate);
                    }
                    continue;
                };

                let text = extract_message_text(host, &event.container);
                if !is_translatable(&text) {
                    if debug {
                        tracing::info!("消息没有可翻译的文本: {:?}", event.container);
                    } else {
                        tracing::debug!("消息没有可翻译的文本: {:?}", event.container);
                    }
                    continue;
                }

                let key = CacheKey::new(&text, event.language);
                if !seen.insert((event.container.clone(), key)) {
                    continue;
                }

                let id = message_id(host, &event.container, &text);
                if debug {
                    tracing::info!(
                        "🎯 {} → {}，消息 {}（{}）",
                        event.flag,
                        event.language,
                        id,
                        event.strategy
                    );
                }

                requests.push(ReactionRequest {
                    container: event.container,
                    message_text: text,
                    target_language: event.language.to_string(),
                    flag: event.flag.to_string(),
                    message_id: id,
                });
            }
        }

        requests
    }

    async fn dispatch(&self, requests: Vec<ReactionRequest<H::Node>>) -> Vec<ReactionOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }

        join_all(
            requests
                .into_iter()
                .map(|request| self.service.handle_reaction(&self.host, request)),
        )
        .await
    }

    // ========================================================================
    // 浮层
    // ========================================================================

    /// 移除到 `now` 为止已过期的浮层
    pub fn sweep(&self, now: Instant) -> usize {
        self.service
            .sweep_expired(&mut *self.host.borrow_mut(), now)
    }

    /// 用户点击关闭按钮
    pub fn close_overlay(&self, container: &H::Node) -> bool {
        self.service
            .close_overlay(&mut *self.host.borrow_mut(), container)
    }

    /// 观察循环：处理每一批变化，并在最早的过期时间到达时清理浮层
    ///
    /// 变化流结束时返回。
    pub async fn run<St>(&self, mut mutations: St)
    where
        St: Stream<Item = Vec<MutationRecord<H::Node>>> + Unpin,
    {
        loop {
            let batch = match self.service.next_expiry() {
                Some(deadline) => tokio::select! {
                    batch = mutations.next() => batch,
                    _ = tokio::time::sleep_until(deadline) => {
                        self.sweep(Instant::now());
                        continue;
                    }
                },
                None => mutations.next().await,
            };

            let Some(batch) = batch else {
                break;
            };
            self.on_mutations(&batch).await;
            self.sweep(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::HtmlPage;
    use crate::translation::config::{store::SETTINGS_KEY, MemoryStore, ServiceKind};
    use crate::translation::error::TranslationResult;
    use async_trait::async_trait;
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl TranslationProvider for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn translate(&self, text: &str, _target: &str) -> TranslationResult<String> {
            Ok(text.to_uppercase())
        }
    }

    const PAGE: &str = r#"<html><body><div id="main">
        <div data-testid="conversation-panel-messages">
          <div data-testid="msg-container" data-id="a1">
            <span class="selectable-text">good night</span>
            <span class="reaction" aria-label="reaction 🇩🇪"></span>
          </div>
        </div></div></body></html>"#;

    #[test]
    fn test_runtime_message_format() {
        let message: RuntimeMessage = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(message, RuntimeMessage::Ping);

        let message: RuntimeMessage =
            serde_json::from_str(r#"{"action":"settingsUpdated","data":{"showFlag":false}}"#)
                .unwrap();
        assert_eq!(
            message,
            RuntimeMessage::SettingsUpdated {
                data: Some(PartialSettings {
                    show_flag: Some(false),
                    ..PartialSettings::default()
                })
            }
        );

        let reply = serde_json::to_value(RuntimeReply::active()).unwrap();
        assert_eq!(reply, json!({"status": "active"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_translates_existing_reactions_once() {
        let mut translator =
            FlagTranslator::new(HtmlPage::parse(PAGE), MemoryStore::new(), TranslatorConfig::default())
                .with_provider(Arc::new(Upper));

        let outcomes = translator.init().await;
        assert_eq!(outcomes, vec![ReactionOutcome::Translated]);
        assert!(translator.host().serialize_html().contains("GOOD NIGHT"));
        assert!(translator.init().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_messages() {
        let store = MemoryStore::new();
        store
            .set(SETTINGS_KEY, json!({"translationService": "deepl"}))
            .unwrap();
        let mut translator =
            FlagTranslator::new(HtmlPage::parse(PAGE), store, TranslatorConfig::default());

        // DeepL 没有 key，已有消息上的回应直接显示配置错误
        let outcomes = translator.init().await;
        assert_eq!(outcomes, vec![ReactionOutcome::ConfigurationError]);

        let reply = translator.handle_message(RuntimeMessage::SettingsUpdated {
            data: Some(PartialSettings {
                translation_service: Some(ServiceKind::LibreTranslate),
                ..PartialSettings::default()
            }),
        });
        assert_eq!(reply, None);
        assert_eq!(
            translator.service().settings().translation_service,
            ServiceKind::LibreTranslate
        );

        translator.handle_message(RuntimeMessage::SettingsUpdated { data: None });
        assert_eq!(
            translator.service().settings().translation_service,
            ServiceKind::DeepL
        );

        assert_eq!(
            translator.handle_message_json(r#"{"action":"ping"}"#).unwrap(),
            Some(RuntimeReply::active())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_clears_state() {
        let mut translator =
            FlagTranslator::new(HtmlPage::parse(PAGE), MemoryStore::new(), TranslatorConfig::default())
                .with_provider(Arc::new(Upper));
        translator.init().await;
        assert_eq!(translator.service().cache().len(), 1);

        translator.disconnect();
        assert!(!translator.is_initialized());
        assert!(!translator.observer().is_attached());
        assert!(translator.service().cache().is_empty());
        assert_eq!(translator.service().active_overlays(), 0);
    }
}
