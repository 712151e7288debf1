//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，配置文件之上的覆盖都经过这里

use std::env;
use std::fmt;
use std::time::Duration;

use crate::translation::config::ExhaustedPolicy;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量被显式设置时返回值，忽略默认值
    fn get_override() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "FLAG_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 调试模式，相当于把 debugMode 设置打开
    pub struct Debug;
    impl EnvVar<bool> for Debug {
        const NAME: &'static str = "FLAG_TRANSLATOR_DEBUG";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Log detection details at info level";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// LibreTranslate 实例列表
    pub struct LibreTranslateUrls;
    impl EnvVar<Vec<String>> for LibreTranslateUrls {
        const NAME: &'static str = "FLAG_TRANSLATOR_LIBRETRANSLATE_URLS";
        const DEFAULT: Option<Vec<String>> = None;
        const DESCRIPTION: &'static str = "LibreTranslate instances to try in order (comma-separated)";

        fn parse(value: &str) -> EnvResult<Vec<String>> {
            let urls: Vec<String> = value
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect();

            if let Some(bad) = urls
                .iter()
                .find(|url| !(url.starts_with("http://") || url.starts_with("https://")))
            {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("URL '{}' must start with http:// or https://", bad),
                });
            }

            Ok(urls)
        }
    }

    /// 单次请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "FLAG_TRANSLATOR_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(15));
        const DESCRIPTION: &'static str = "Per-request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_positive_u64(value, Self::NAME, 1, 300).map(Duration::from_secs)
        }
    }

    /// 端点全部失败时的处理方式
    pub struct OnExhausted;
    impl EnvVar<ExhaustedPolicy> for OnExhausted {
        const NAME: &'static str = "FLAG_TRANSLATOR_ON_EXHAUSTED";
        const DEFAULT: Option<ExhaustedPolicy> = Some(ExhaustedPolicy::Fail);
        const DESCRIPTION: &'static str =
            "What to do when every endpoint failed: fail, placeholder";

        fn parse(value: &str) -> EnvResult<ExhaustedPolicy> {
            value.parse().map_err(|message| EnvError {
                variable: Self::NAME.to_string(),
                message,
            })
        }
    }

    /// DeepL API key
    pub struct DeeplApiKey;
    impl EnvVar<String> for DeeplApiKey {
        const NAME: &'static str = "FLAG_TRANSLATOR_DEEPL_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "DeepL API key used when the settings store has none";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key must not be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_u64(value: &str, var_name: &str, min: u64, max: u64) -> EnvResult<u64> {
    let num: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn doc_line<T: fmt::Debug, V: EnvVar<T>>() -> String {
    format!(
        "| `{}` | {} | {:?} |\n",
        V::NAME,
        V::DESCRIPTION,
        V::DEFAULT
    )
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");
    docs.push_str("| Variable | Description | Default |\n");
    docs.push_str("|---|---|---|\n");

    docs.push_str(&doc_line::<String, core::LogLevel>());
    docs.push_str(&doc_line::<bool, core::Debug>());
    docs.push_str(&doc_line::<bool, core::NoColor>());
    docs.push_str(&doc_line::<Vec<String>, translation::LibreTranslateUrls>());
    docs.push_str(&doc_line::<Duration, translation::RequestTimeout>());
    docs.push_str(&doc_line::<ExhaustedPolicy, translation::OnExhausted>());
    docs.push_str(&doc_line::<String, translation::DeeplApiKey>());

    docs
}
