//! 部署配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 整条端点链失败之后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustedPolicy {
    /// 返回错误，显示错误浮层
    #[default]
    Fail,
    /// 返回带明显标记的占位文本
    Placeholder,
}

impl FromStr for ExhaustedPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "fail" | "error" => Ok(ExhaustedPolicy::Fail),
            "placeholder" | "demo" => Ok(ExhaustedPolicy::Placeholder),
            other => Err(format!("Unknown policy '{}'. Use: fail, placeholder", other)),
        }
    }
}

impl fmt::Display for ExhaustedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustedPolicy::Fail => write!(f, "fail"),
            ExhaustedPolicy::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Google 备用端点，不同地址要求不同的 `client` 参数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GoogleEndpoint {
    pub url: String,
    pub client: String,
}

/// 部署配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslatorConfig {
    // 端点
    pub libretranslate_instances: Vec<String>,
    pub google_endpoints: Vec<GoogleEndpoint>,
    pub deepl_endpoint: String,
    /// 设置存储里没有 key 时使用
    pub deepl_api_key: Option<String>,

    // 请求
    pub request_timeout_secs: u64,
    pub endpoint_delay_ms: u64,
    pub on_exhausted: ExhaustedPolicy,
    pub user_agent: String,

    // 聊天容器挂载
    pub attach_max_attempts: u32,
    pub attach_backoff_ms: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            libretranslate_instances: constants::LIBRETRANSLATE_INSTANCES
                .iter()
                .map(|url| url.to_string())
                .collect(),
            google_endpoints: constants::GOOGLE_ENDPOINTS
                .iter()
                .map(|(url, client)| GoogleEndpoint {
                    url: url.to_string(),
                    client: client.to_string(),
                })
                .collect(),
            deepl_endpoint: constants::DEEPL_ENDPOINT.to_string(),
            deepl_api_key: None,

            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            endpoint_delay_ms: constants::DEFAULT_ENDPOINT_DELAY.as_millis() as u64,
            on_exhausted: ExhaustedPolicy::Fail,
            user_agent: constants::USER_AGENT.to_string(),

            attach_max_attempts: constants::ATTACH_MAX_ATTEMPTS,
            attach_backoff_ms: constants::ATTACH_BACKOFF.as_millis() as u64,
        }
    }
}

impl TranslatorConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(TranslationError::ConfigError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.attach_max_attempts == 0 {
            return Err(TranslationError::ConfigError(
                "attach_max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.libretranslate_instances.is_empty() && self.google_endpoints.is_empty() {
            return Err(TranslationError::ConfigError(
                "at least one translation endpoint is required".to_string(),
            ));
        }

        for url in self
            .libretranslate_instances
            .iter()
            .chain(self.google_endpoints.iter().map(|endpoint| &endpoint.url))
            .chain(std::iter::once(&self.deepl_endpoint))
        {
            url::Url::parse(url).map_err(|e| {
                TranslationError::ConfigError(format!("Invalid endpoint URL '{}': {}", url, e))
            })?;
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{translation, EnvVar};

        match translation::LibreTranslateUrls::get_override() {
            Ok(Some(urls)) => {
                tracing::info!("环境变量覆盖 LibreTranslate 实例: {:?}", urls);
                self.libretranslate_instances = urls;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("忽略环境变量: {}", e),
        }

        match translation::RequestTimeout::get_override() {
            Ok(Some(timeout)) => self.request_timeout_secs = timeout.as_secs(),
            Ok(None) => {}
            Err(e) => tracing::warn!("忽略环境变量: {}", e),
        }

        match translation::OnExhausted::get_override() {
            Ok(Some(policy)) => self.on_exhausted = policy,
            Ok(None) => {}
            Err(e) => tracing::warn!("忽略环境变量: {}", e),
        }

        match translation::DeeplApiKey::get_override() {
            Ok(Some(key)) => self.deepl_api_key = Some(key),
            Ok(None) => {}
            Err(e) => tracing::warn!("忽略环境变量: {}", e),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn endpoint_delay(&self) -> Duration {
        Duration::from_millis(self.endpoint_delay_ms)
    }

    pub fn attach_backoff(&self) -> Duration {
        Duration::from_millis(self.attach_backoff_ms)
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslatorConfig,
}

impl ConfigManager {
    /// 按搜索路径加载配置，再应用环境变量
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        Self::load_dotenv();
        let mut config = Self::load_from_file(path.as_ref())?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    pub fn into_config(self) -> TranslatorConfig {
        self.config
    }

    fn load_config() -> TranslationResult<TranslatorConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(candidate);
            }
        }

        tracing::debug!("未找到配置文件，使用默认配置");
        Ok(TranslatorConfig::default())
    }

    fn load_from_file(path: &Path) -> TranslationResult<TranslatorConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;

        if path.extension().map_or(false, |ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| {
                TranslationError::ConfigError(format!("Invalid JSON config: {}", e))
            })
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let content = toml::to_string_pretty(&TranslatorConfig::default())
            .map_err(|e| TranslationError::InternalError(format!("Cannot serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranslatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.libretranslate_instances.len(), 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.on_exhausted, ExhaustedPolicy::Fail);
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let config = TranslatorConfig {
            libretranslate_instances: vec!["not a url".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "libretranslate_instances = [\"http://localhost:5000\"]\non_exhausted = \"placeholder\""
        )
        .unwrap();

        let config = ConfigManager::load_from_file(file.path()).unwrap();
        assert_eq!(config.libretranslate_instances, vec!["http://localhost:5000"]);
        assert_eq!(config.on_exhausted, ExhaustedPolicy::Placeholder);
        assert_eq!(config.attach_max_attempts, constants::ATTACH_MAX_ATTEMPTS);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Placeholder".parse::<ExhaustedPolicy>(), Ok(ExhaustedPolicy::Placeholder));
        assert_eq!("fail".parse::<ExhaustedPolicy>(), Ok(ExhaustedPolicy::Fail));
        assert!("maybe".parse::<ExhaustedPolicy>().is_err());
    }
}
