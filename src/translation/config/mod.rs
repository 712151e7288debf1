//! 翻译配置管理模块
//!
//! - `manager`: 部署配置（端点、超时、重试），来自配置文件和环境变量
//! - `settings`: 用户设置，由外部设置界面写入
//! - `store`: 持久化设置存储的接口与实现

pub mod manager;
pub mod settings;
pub mod store;

// 重新导出主要类型
pub use manager::{ConfigManager, ExhaustedPolicy, GoogleEndpoint, TranslatorConfig};
pub use settings::{PartialSettings, ServiceKind, Settings};
pub use store::{JsonFileStore, MemoryStore, SettingsStore, API_KEY, SETTINGS_KEY};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 翻译端点
    pub const LIBRETRANSLATE_INSTANCES: &[&str] = &[
        "https://libretranslate.de",
        "https://translate.terraprint.co",
        "https://libretranslate.com",
    ];
    pub const GOOGLE_ENDPOINTS: &[(&str, &str)] = &[
        ("https://translate.googleapis.com/translate_a/single", "gtx"),
        ("https://clients5.google.com/translate_a/t", "dict-chrome-ex"),
    ];
    pub const DEEPL_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";
    pub const USER_AGENT: &str = concat!("flag-translator/", env!("CARGO_PKG_VERSION"));

    // 请求与重试
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DEFAULT_ENDPOINT_DELAY: Duration = Duration::from_millis(1000);

    // 浮层
    pub const ERROR_OVERLAY_TTL: Duration = Duration::from_secs(5);

    // 检测与提取
    pub const MIN_MESSAGE_CHARS: usize = 2;
    pub const PROXIMITY_THRESHOLD_PX: f64 = 200.0;
    pub const ANCESTOR_SCAN_DEPTH: usize = 10;
    pub const MESSAGE_ID_TEXT_CHARS: usize = 100;

    // 聊天容器挂载
    pub const ATTACH_MAX_ATTEMPTS: u32 = 30;
    pub const ATTACH_BACKOFF: Duration = Duration::from_millis(1000);

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "flag-translator.toml",
        ".flag-translator.toml",
        "~/.config/flag-translator/config.toml",
    ];
}
