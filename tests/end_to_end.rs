//! 端到端测试
//!
//! 从挂载、扫描已有消息，到回放页面变化、运行时消息和浮层过期的完整流程

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flag_translator::host::{OverlayKind, PageHost};
use flag_translator::translation::config::{
    JsonFileStore, MemoryStore, SettingsStore, API_KEY, SETTINGS_KEY,
};
use flag_translator::translation::{
    ReactionOutcome, ServiceKind, TranslationProvider, TranslatorConfig,
};
use flag_translator::{FlagTranslator, HtmlPage, MutationRecord, RuntimeMessage};

mod common {
    include!("common/mod.rs");
}

use common::{chat_page, reaction_markup, ScriptedProvider, CHAT_PAGE};

fn translator_with(
    provider: Arc<ScriptedProvider>,
    store: MemoryStore,
) -> FlagTranslator<HtmlPage, MemoryStore> {
    FlagTranslator::new(chat_page(), store, TranslatorConfig::default())
        .with_provider(provider as Arc<dyn TranslationProvider>)
}

fn m(translator: &FlagTranslator<HtmlPage, MemoryStore>, id: &str) -> ego_tree::NodeId {
    translator
        .host()
        .query(&format!("[data-id=\"{}\"]", id))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_existing_reaction_is_translated_on_init() {
    let provider = ScriptedProvider::echo();
    let mut translator = translator_with(provider.clone(), MemoryStore::new());

    // m1 的回应按钮会被多次扫描到，同一批次里只发一个请求
    let outcomes = translator.init().await;
    assert_eq!(outcomes, vec![ReactionOutcome::Translated]);
    assert_eq!(provider.calls(), 1);
    assert_eq!(
        provider.requests(),
        vec![("Good morning, how are you?".to_string(), "fr".to_string())]
    );

    let m1 = m(&translator, "m1");
    let m3 = m(&translator, "m3");
    assert_eq!(translator.service().overlay_kind(&m1), Some(OverlayKind::Result));
    // 不认识的国旗不产生浮层
    assert_eq!(translator.service().overlay_kind(&m3), None);
    assert!(translator.host().serialize_html().contains("[fr] Good morning, how are you?"));
}

#[tokio::test(start_paused = true)]
async fn test_new_reaction_from_mutation() {
    let provider = ScriptedProvider::echo();
    let mut translator = translator_with(provider.clone(), MemoryStore::new());
    translator.init().await;

    let m2 = m(&translator, "m2");
    let added = translator.host_mut().insert_html(m2, &reaction_markup("🇩🇪"));
    let outcomes = translator
        .on_mutations(&[MutationRecord::child_list(m2, added)])
        .await;

    assert!(outcomes.contains(&ReactionOutcome::Translated));
    assert_eq!(provider.calls(), 2);
    assert!(provider
        .requests()
        .contains(&("Thank you much for the help".to_string(), "de".to_string())));
    assert_eq!(translator.service().overlay_kind(&m2), Some(OverlayKind::Result));
}

#[tokio::test(start_paused = true)]
async fn test_own_overlay_insertion_does_not_retrigger() {
    let provider = ScriptedProvider::echo();
    let mut translator = translator_with(provider.clone(), MemoryStore::new());
    translator.init().await;

    let m1 = m(&translator, "m1");
    let overlay = translator
        .host()
        .select_first(&m1, ".flag-translation")
        .unwrap();
    let before = translator.host().serialize_html();

    let outcomes = translator
        .on_mutations(&[MutationRecord::child_list(m1, vec![overlay])])
        .await;
    assert!(outcomes.is_empty());
    assert_eq!(provider.calls(), 1);
    assert_eq!(translator.host().serialize_html(), before);

    // 页面自己重绘消息时，已显示的译文不会重复渲染
    let outcomes = translator
        .on_mutations(&[MutationRecord::attribute(m1, "class")])
        .await;
    assert_eq!(outcomes, vec![ReactionOutcome::AlreadyShown]);
    assert_eq!(translator.host().serialize_html(), before);
}

#[tokio::test(start_paused = true)]
async fn test_mutations_ignored_before_init_and_after_disconnect() {
    let provider = ScriptedProvider::echo();
    let mut translator = translator_with(provider.clone(), MemoryStore::new());

    let m2 = m(&translator, "m2");
    let added = translator.host_mut().insert_html(m2, &reaction_markup("🇩🇪"));
    let records = vec![MutationRecord::child_list(m2, added)];
    assert!(translator.on_mutations(&records).await.is_empty());

    translator.init().await;
    translator.disconnect();
    assert!(translator.on_mutations(&records).await.is_empty());
    // init 扫描时已经翻译过 m1 和 m2
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_attribute_change_on_message() {
    let provider = ScriptedProvider::echo();
    let mut translator = translator_with(provider.clone(), MemoryStore::new());
    translator.init().await;

    let m2 = m(&translator, "m2");
    let span = translator
        .host()
        .select_first(&m2, ".selectable-text")
        .unwrap();

    // 不关注的属性
    let outcomes = translator
        .on_mutations(&[MutationRecord::attribute(span, "style")])
        .await;
    assert!(outcomes.is_empty());

    translator.host_mut().insert_html(m2, r#"<span title="Ana reacted with 🇮🇹">🇮🇹</span>"#);
    let outcomes = translator
        .on_mutations(&[MutationRecord::attribute(m2, "title")])
        .await;
    assert!(outcomes.contains(&ReactionOutcome::Translated));
    assert!(provider
        .requests()
        .iter()
        .any(|(_, language)| language == "it"));
}

#[tokio::test(start_paused = true)]
async fn test_settings_update_and_expiry_loop() {
    let provider = ScriptedProvider::echo();
    let store = MemoryStore::new();
    store
        .set(SETTINGS_KEY, json!({"duration": 10, "showFlag": false}))
        .unwrap();
    let mut translator = translator_with(provider, store);
    translator.init().await;

    let m1 = m(&translator, "m1");
    assert!(!translator.host().serialize_html().contains("flag-emoji"));
    let expiry = translator.service().next_expiry().unwrap();

    // 观察循环在过期时间到达时清理浮层
    let quiet_page = futures::stream::pending()
        .take_until(Box::pin(tokio::time::sleep(Duration::from_secs(11))));
    translator.run(Box::pin(quiet_page)).await;
    assert!(Instant::now() >= expiry);
    assert_eq!(translator.service().overlay_kind(&m1), None);

    translator.handle_message(RuntimeMessage::SettingsUpdated {
        data: Some(serde_json::from_value(json!({"autoHide": false})).unwrap()),
    });
    let settings = translator.service().settings();
    assert!(!settings.auto_hide);
    assert_eq!(settings.duration, 10);
}

#[tokio::test(start_paused = true)]
async fn test_deepl_without_key_then_key_update() {
    let store = MemoryStore::new();
    store
        .set(SETTINGS_KEY, json!({"translationService": "deepl"}))
        .unwrap();
    let mut translator =
        FlagTranslator::new(chat_page(), store, TranslatorConfig::default());

    let outcomes = translator.init().await;
    assert!(outcomes.contains(&ReactionOutcome::ConfigurationError));
    assert!(translator
        .host()
        .serialize_html()
        .contains("DeepL API key not configured"));

    translator.store().set(API_KEY, json!("secret:fx")).unwrap();
    assert_eq!(translator.handle_message(RuntimeMessage::ApiKeyUpdated), None);
    assert_eq!(
        translator.service().settings().translation_service,
        ServiceKind::DeepL
    );
}

#[tokio::test]
async fn test_json_store_and_live_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"translatedText": "Bonjour, comment ça va ?"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("settings.json");
    std::fs::write(
        &store_path,
        json!({"translatorSettings": {"bubbleSize": 140}}).to_string(),
    )
    .unwrap();

    let config = TranslatorConfig {
        libretranslate_instances: vec![server.uri()],
        google_endpoints: Vec::new(),
        endpoint_delay_ms: 0,
        ..TranslatorConfig::default()
    };
    let mut translator =
        FlagTranslator::new(HtmlPage::parse(CHAT_PAGE), JsonFileStore::new(&store_path), config);
    translator.init().await;

    let html = translator.host().serialize_html();
    assert!(html.contains("Bonjour, comment ça va ?"));
    assert!(html.contains("font-size: 140%"));
}
