//! 持久化设置存储
//!
//! 只需要 get/set 两个操作，值一律是 JSON。设置界面写入，本 crate 在
//! 启动和收到更新消息时读取。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::{Map, Value};

use super::settings::Settings;
use crate::translation::error::{helpers::store_error, TranslationResult};

/// DeepL API key 的存储键
pub const API_KEY: &str = "apiKey";

/// 用户设置的存储键
pub const SETTINGS_KEY: &str = "translatorSettings";

/// 键值设置存储
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> TranslationResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> TranslationResult<()>;

    /// 读取 API key，空字符串视为未设置
    fn load_api_key(&self) -> TranslationResult<Option<String>> {
        Ok(self
            .get(API_KEY)?
            .and_then(|value| value.as_str().map(|key| key.trim().to_string()))
            .filter(|key| !key.is_empty()))
    }

    /// 读取用户设置，缺失时返回 `None`
    fn load_settings(&self) -> TranslationResult<Option<Settings>> {
        match self.get(SETTINGS_KEY)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| store_error(format!("invalid {}: {}", SETTINGS_KEY, e))),
            None => Ok(None),
        }
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> TranslationResult<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|_| store_error("memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> TranslationResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| store_error("memory store lock poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// 单个 JSON 对象文件作为存储
///
/// 每次读取都重新打开文件，这样外部写入能被 `settingsUpdated` 之后的重新加载看到。
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: RwLock<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> TranslationResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(store_error(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(store_error(format!("{}: {}", self.path.display(), e))),
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> TranslationResult<Option<Value>> {
        let _guard = self
            .write_lock
            .read()
            .map_err(|_| store_error("file store lock poisoned"))?;
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> TranslationResult<()> {
        let _guard = self
            .write_lock
            .write()
            .map_err(|_| store_error("file store lock poisoned"))?;

        let mut map = self.read_all()?;
        map.insert(key.to_string(), value);

        let content = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| store_error(e.to_string()))?;
        std::fs::write(&self.path, content)?;

        tracing::debug!("设置已写入 {}: {}", self.path.display(), key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(API_KEY).unwrap(), None);
        store.set(API_KEY, json!("abc:fx")).unwrap();
        assert_eq!(store.load_api_key().unwrap().as_deref(), Some("abc:fx"));
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let store = MemoryStore::new();
        store.set(API_KEY, json!("   ")).unwrap();
        assert_eq!(store.load_api_key().unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        JsonFileStore::new(&path)
            .set(SETTINGS_KEY, json!({"duration": 30, "debugMode": true}))
            .unwrap();

        let settings = JsonFileStore::new(&path).load_settings().unwrap().unwrap();
        assert_eq!(settings.duration, 30);
        assert!(settings.debug_mode);
        assert_eq!(settings.bubble_size, 100);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load_settings().unwrap(), None);
    }

    #[test]
    fn test_malformed_settings_is_store_error() {
        let store = MemoryStore::new();
        store.set(SETTINGS_KEY, json!({"duration": "long"})).unwrap();
        assert!(matches!(
            store.load_settings(),
            Err(crate::translation::error::TranslationError::StoreError(_))
        ));
    }
}
