//! 翻译编排服务
//!
//! 处理一次国旗回应的完整流程：查缓存、去重、调用客户端、维护浮层。
//!
//! ## 浮层
//!
//! 每个消息容器最多只有一个浮层，渲染新浮层前先移除旧的。结果浮层在
//! `autoHide` 打开时按 `duration` 过期，错误浮层固定 5 秒过期。过期由
//! [`TranslationService::sweep_expired`] 统一处理，时间取自 tokio 时钟。
//!
//! ## 并发
//!
//! 宿主页面放在 `RefCell` 里，只在同步片段内借用，从不跨 `.await` 持有。
//! 缓存和进行中集合是 `DashMap`，浮层账本由 `Mutex` 保护。

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::time::Instant;

use super::providers::TranslationProvider;
use crate::host::{Overlay, OverlayKind, PageHost};
use crate::translation::config::{constants, Settings};
use crate::translation::error::{helpers::log_error, TranslationError};
use crate::translation::pipeline::compress_text;
use crate::translation::storage::{CacheKey, InFlightSet, TranslationCache};

/// 当前可用的翻译客户端，或者构建失败的原因
pub type ClientSlot = Result<Arc<dyn TranslationProvider>, TranslationError>;

/// 一次回应触发的翻译请求
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionRequest<N> {
    pub container: N,
    pub message_text: String,
    pub target_language: String,
    pub flag: String,
    pub message_id: String,
}

/// 处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// 命中缓存，直接显示
    Cached,
    /// 同一个键已经在翻译中，什么都不做
    AlreadyInFlight,
    /// 客户端配置错误，显示错误浮层，没有网络请求
    ConfigurationError,
    /// 容器上已经显示着同一段译文，什么都不做
    AlreadyShown,
    /// 翻译成功
    Translated,
    /// 端点链耗尽，显示占位文本，不写缓存
    Placeholder,
    /// 端点链失败，显示错误浮层
    Failed,
}

#[derive(Debug, Clone)]
struct ActiveOverlay {
    id: u64,
    kind: OverlayKind,
    /// 结果浮层对应的缓存键，占位文本没有
    key: Option<CacheKey>,
    expires_at: Option<Instant>,
}

/// 服务统计信息
#[derive(Debug, Default)]
pub struct ServiceStats {
    reactions_handled: AtomicU64,
    cache_hits: AtomicU64,
    duplicates_skipped: AtomicU64,
    translations_completed: AtomicU64,
    errors: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub reactions_handled: u64,
    pub cache_hits: u64,
    pub duplicates_skipped: u64,
    pub translations_completed: u64,
    pub errors: u64,
}

impl ServiceStats {
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            reactions_handled: self.reactions_handled.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            translations_completed: self.translations_completed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// 翻译编排服务
pub struct TranslationService<N> {
    settings: RwLock<Settings>,
    client: RwLock<ClientSlot>,
    cache: TranslationCache,
    in_flight: InFlightSet,
    overlays: Mutex<HashMap<N, ActiveOverlay>>,
    next_overlay_id: AtomicU64,
    stats: ServiceStats,
}

impl<N> TranslationService<N>
where
    N: Clone + Eq + Hash + std::fmt::Debug,
{
    pub fn new(settings: Settings, client: ClientSlot) -> Self {
        Self {
            settings: RwLock::new(settings),
            client: RwLock::new(client),
            cache: TranslationCache::new(),
            in_flight: InFlightSet::new(),
            overlays: Mutex::new(HashMap::new()),
            next_overlay_id: AtomicU64::new(1),
            stats: ServiceStats::default(),
        }
    }

    /// 当前设置的副本
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_settings(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// 替换翻译客户端
    pub fn set_client(&self, client: ClientSlot) {
        if let Err(e) = &client {
            tracing::warn!("翻译客户端不可用: {}", e);
        }
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
    }

    fn current_client(&self) -> ClientSlot {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// 处理一次回应
    ///
    /// 任何失败都不会向外传播，只会体现在返回值和页面浮层上。
    pub async fn handle_reaction<H>(
        &self,
        host: &RefCell<H>,
        request: ReactionRequest<N>,
    ) -> ReactionOutcome
    where
        H: PageHost<Node = N>,
    {
        self.stats.reactions_handled.fetch_add(1, Ordering::Relaxed);
        let settings = self.settings();
        let key = CacheKey::new(&request.message_text, &request.target_language);
        let flag = settings.show_flag.then(|| request.flag.clone());

        if self.shows_result(&request.container, &key) {
            tracing::debug!("译文已在显示: {} → {}", request.message_id, key.language);
            self.stats.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
            return ReactionOutcome::AlreadyShown;
        }

        if settings.cache_translations {
            if let Some(cached) = self.cache.get(&key) {
                tracing::debug!("使用缓存译文: {}", request.message_id);
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                self.render(
                    &mut *host.borrow_mut(),
                    &request.container,
                    OverlayKind::Result,
                    flag,
                    cached,
                    Some(key),
                    &settings,
                );
                return ReactionOutcome::Cached;
            }
        }

        let Some(_guard) = self.in_flight.try_acquire(key.clone()) else {
            tracing::debug!("翻译已在进行中: {} → {}", request.message_id, key.language);
            self.stats.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
            return ReactionOutcome::AlreadyInFlight;
        };

        let client = match self.current_client() {
            Ok(client) => client,
            Err(e) => {
                log_error(&e);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                self.render(
                    &mut *host.borrow_mut(),
                    &request.container,
                    OverlayKind::Error,
                    None,
                    e.to_string(),
                    None,
                    &settings,
                );
                return ReactionOutcome::ConfigurationError;
            }
        };

        self.render(
            &mut *host.borrow_mut(),
            &request.container,
            OverlayKind::Loading,
            flag.clone(),
            String::new(),
            None,
            &settings,
        );

        let text = if settings.compress_text {
            let compressed = compress_text(&request.message_text);
            if compressed.is_empty() {
                request.message_text.clone()
            } else {
                compressed
            }
        } else {
            request.message_text.clone()
        };

        tracing::info!(
            "开始翻译 {} → {}（{} 字符）",
            request.message_id,
            request.target_language,
            text.chars().count()
        );

        match client
            .translate_detailed(&text, &request.target_language)
            .await
        {
            Ok(translation) if translation.placeholder => {
                tracing::debug!("占位文本不写入缓存: {}", request.message_id);
                self.render(
                    &mut *host.borrow_mut(),
                    &request.container,
                    OverlayKind::Result,
                    flag,
                    translation.text,
                    None,
                    &settings,
                );
                ReactionOutcome::Placeholder
            }
            Ok(translation) => {
                if settings.cache_translations {
                    self.cache.insert(key.clone(), translation.text.clone());
                }
                self.stats.translations_completed.fetch_add(1, Ordering::Relaxed);
                self.render(
                    &mut *host.borrow_mut(),
                    &request.container,
                    OverlayKind::Result,
                    flag,
                    translation.text,
                    Some(key),
                    &settings,
                );
                ReactionOutcome::Translated
            }
            Err(e) => {
                log_error(&e);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                self.render(
                    &mut *host.borrow_mut(),
                    &request.container,
                    OverlayKind::Error,
                    None,
                    format!("Translation failed: {}", e),
                    None,
                    &settings,
                );
                ReactionOutcome::Failed
            }
        }
    }

    /// 容器上是否正显示着 `key` 对应的译文
    fn shows_result(&self, container: &N, key: &CacheKey) -> bool {
        self.overlays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container)
            .map_or(false, |overlay| {
                overlay.kind == OverlayKind::Result && overlay.key.as_ref() == Some(key)
            })
    }

    /// 替换容器上的浮层并记录过期时间
    fn render<H>(
        &self,
        host: &mut H,
        container: &N,
        kind: OverlayKind,
        flag: Option<String>,
        text: String,
        key: Option<CacheKey>,
        settings: &Settings,
    ) where
        H: PageHost<Node = N>,
    {
        host.remove_overlay(container);

        let id = self.next_overlay_id.fetch_add(1, Ordering::Relaxed);
        let overlay = Overlay {
            id,
            kind,
            flag,
            text,
            bubble_size: settings.bubble_size,
        };

        let mut book = self.overlays.lock().unwrap_or_else(PoisonError::into_inner);
        if !host.render_overlay(container, &overlay) {
            tracing::warn!("无法在容器上渲染浮层: {:?}", container);
            book.remove(container);
            return;
        }

        let ttl = match kind {
            OverlayKind::Loading => None,
            OverlayKind::Result => settings.result_ttl(),
            OverlayKind::Error => Some(constants::ERROR_OVERLAY_TTL),
        };
        book.insert(
            container.clone(),
            ActiveOverlay {
                id,
                kind,
                key,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
    }

    /// 移除所有在 `now` 之前过期的浮层，返回移除数量
    pub fn sweep_expired<H>(&self, host: &mut H, now: Instant) -> usize
    where
        H: PageHost<Node = N>,
    {
        let mut book = self.overlays.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<N> = book
            .iter()
            .filter(|(_, overlay)| overlay.expires_at.map_or(false, |at| at <= now))
            .map(|(container, _)| container.clone())
            .collect();

        for container in &expired {
            if let Some(overlay) = book.remove(container) {
                tracing::debug!("浮层 {} 已过期（{:?}）", overlay.id, overlay.kind);
            }
            host.remove_overlay(container);
        }

        expired.len()
    }

    /// 用户关闭浮层，加载中的浮层不能关闭
    pub fn close_overlay<H>(&self, host: &mut H, container: &N) -> bool
    where
        H: PageHost<Node = N>,
    {
        let mut book = self.overlays.lock().unwrap_or_else(PoisonError::into_inner);
        match book.get(container) {
            Some(overlay) if overlay.kind != OverlayKind::Loading => {
                book.remove(container);
                host.remove_overlay(container)
            }
            _ => false,
        }
    }

    /// 容器上当前浮层的种类
    pub fn overlay_kind(&self, container: &N) -> Option<OverlayKind> {
        self.overlays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container)
            .map(|overlay| overlay.kind)
    }

    /// 最早的过期时间，观察循环据此安排下一次清理
    pub fn next_expiry(&self) -> Option<Instant> {
        self.overlays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|overlay| overlay.expires_at)
            .min()
    }

    pub fn active_overlays(&self) -> usize {
        self.overlays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 清空缓存、进行中集合和浮层账本
    pub fn clear(&self) {
        self.cache.clear();
        self.in_flight.clear();
        self.overlays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::HtmlPage;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl TranslationProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn translate(
            &self,
            text: &str,
            target: &str,
        ) -> crate::translation::error::TranslationResult<String> {
            Ok(format!("{}:{}", target, text))
        }
    }

    fn page() -> (RefCell<HtmlPage>, ego_tree::NodeId) {
        let page = HtmlPage::parse(r#"<div data-testid="msg-container" id="m">Hello</div>"#);
        let container = page.query("#m").unwrap();
        (RefCell::new(page), container)
    }

    fn request(container: ego_tree::NodeId, text: &str) -> ReactionRequest<ego_tree::NodeId> {
        ReactionRequest {
            container,
            message_text: text.to_string(),
            target_language: "fr".to_string(),
            flag: "🇫🇷".to_string(),
            message_id: "m".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_compression_applies_before_translation() {
        let (host, container) = page();
        let service = TranslationService::new(Settings::default(), Ok(Arc::new(Echo)));

        let outcome = service
            .handle_reaction(&host, request(container, "I think that this is very good"))
            .await;
        assert_eq!(outcome, ReactionOutcome::Translated);
        assert!(host.borrow().serialize_html().contains("fr:this is good"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_flag() {
        let (host, container) = page();
        let settings = Settings {
            show_flag: false,
            ..Settings::default()
        };
        let service = TranslationService::new(settings, Ok(Arc::new(Echo)));
        service.handle_reaction(&host, request(container, "Hello")).await;
        assert!(!host.borrow().serialize_html().contains("flag-emoji"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_overlay_expires_after_five_seconds() {
        let (host, container) = page();
        let service = TranslationService::new(
            Settings::default(),
            Err(TranslationError::ConfigError("DeepL API key not configured".into())),
        );

        let outcome = service.handle_reaction(&host, request(container, "Hello")).await;
        assert_eq!(outcome, ReactionOutcome::ConfigurationError);
        assert_eq!(service.overlay_kind(&container), Some(OverlayKind::Error));
        assert!(host.borrow().serialize_html().contains("DeepL API key not configured"));

        let now = Instant::now();
        assert_eq!(service.sweep_expired(&mut *host.borrow_mut(), now + Duration::from_secs(4)), 0);
        assert_eq!(service.sweep_expired(&mut *host.borrow_mut(), now + Duration::from_secs(5)), 1);
        assert_eq!(service.overlay_kind(&container), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_overlay() {
        let (host, container) = page();
        let service = TranslationService::new(Settings::default(), Ok(Arc::new(Echo)));
        service.handle_reaction(&host, request(container, "Hello")).await;

        assert!(service.close_overlay(&mut *host.borrow_mut(), &container));
        assert!(!service.close_overlay(&mut *host.borrow_mut(), &container));
        assert!(!host.borrow().serialize_html().contains("flag-translation"));
    }
}
