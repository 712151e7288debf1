// 集成测试公共模块
//
// 聊天页面样例和可编排的翻译提供者

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use flag_translator::translation::{TranslationError, TranslationProvider, TranslationResult};
use flag_translator::HtmlPage;

/// 三条消息：m1 带 🇫🇷 回应，m2 没有回应，m3 带一个不认识的国旗
pub const CHAT_PAGE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Chat</title></head>
<body>
<div id="side"><span class="status" title="Status 🇧🇷">away</span></div>
<div id="main">
  <div data-testid="conversation-panel-messages">
    <div data-testid="msg-container" data-id="m1" class="message-in">
      <div class="copyable-text"><span class="selectable-text">Good morning, how are you?</span></div>
      <span data-testid="msg-time">09:14</span>
      <div data-testid="reactions"><button aria-label="reaction 🇫🇷">🇫🇷</button></div>
    </div>
    <div data-testid="msg-container" data-id="m2" class="message-out">
      <div class="copyable-text"><span class="selectable-text">Thank you very much for the help</span></div>
      <span data-testid="msg-time">09:15</span>
    </div>
    <div data-testid="msg-container" data-id="m3" class="message-in">
      <div class="copyable-text"><span class="selectable-text">See you tomorrow</span></div>
      <div data-testid="reactions"><button aria-label="reaction 🇦🇶">🇦🇶</button></div>
    </div>
  </div>
</div>
</body></html>"#;

pub fn chat_page() -> HtmlPage {
    HtmlPage::parse(CHAT_PAGE)
}

/// 一条回应的标记
pub fn reaction_markup(flag: &str) -> String {
    format!(
        r#"<div data-testid="reactions"><button aria-label="reaction {flag}">{flag}</button></div>"#
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Echo,
    Fail,
}

/// 记录调用次数的测试提供者
///
/// 成功时返回 `[<target>] <text>`，失败时返回 HTTP 503。
#[derive(Debug)]
pub struct ScriptedProvider {
    reply: Reply,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    fn build(reply: Reply, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            delay,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn echo() -> Arc<Self> {
        Self::build(Reply::Echo, None)
    }

    /// 每次调用先等待 `delay`（tokio 时钟）
    pub fn delayed(delay: Duration) -> Arc<Self> {
        Self::build(Reply::Echo, Some(delay))
    }

    pub fn failing() -> Arc<Self> {
        Self::build(Reply::Fail, None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到的 (text, target) 列表
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), target_language.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.reply {
            Reply::Echo => Ok(format!("[{}] {}", target_language, text)),
            Reply::Fail => Err(TranslationError::HttpStatus {
                status: 503,
                message: "Service Unavailable - server overloaded".to_string(),
            }),
        }
    }
}
