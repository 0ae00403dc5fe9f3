use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_session_key")]
    pub session_key: String,
    #[serde(default = "default_tokens_key")]
    pub tokens_key: String,
    #[serde(default = "default_transactions_key")]
    pub transactions_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: default_storage_path(),
            session_key: default_session_key(),
            tokens_key: default_tokens_key(),
            transactions_key: default_transactions_key(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_handle_min_len")]
    pub handle_min_len: usize,
    #[serde(default = "default_handle_max_len")]
    pub handle_max_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { handle_min_len: default_handle_min_len(), handle_max_len: default_handle_max_len() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_initial_state")]
    pub initial_state: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { initial_state: default_initial_state(), history_limit: default_history_limit() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: default_log_format() }
    }
}

fn default_storage_path() -> String { "data/local_storage.json".into() }
fn default_session_key() -> String { "wallet.session".into() }
fn default_tokens_key() -> String { "wallet.tokens".into() }
fn default_transactions_key() -> String { "wallet.transactions".into() }
fn default_handle_min_len() -> usize { 1 }
fn default_handle_max_len() -> usize { 32 }
fn default_initial_state() -> String { "guest".into() }
fn default_history_limit() -> usize { 100 }
fn default_log_format() -> String { "compact".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (or `config.toml`); a missing file yields defaults.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.storage.validate()?;
        self.auth.validate()?;
        self.state.normalize()?;
        // 未知的日志格式回退为 compact
        if self.logging.format != "json" {
            self.logging.format = default_log_format();
        }
        Ok(())
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == StorageBackend::File && self.path.trim().is_empty() {
            return Err(anyhow!("storage.path 为空；file 后端需要提供存储文件路径"));
        }
        let keys = [&self.session_key, &self.tokens_key, &self.transactions_key];
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(anyhow!("storage 键名不能为空"));
        }
        if self.session_key == self.tokens_key
            || self.session_key == self.transactions_key
            || self.tokens_key == self.transactions_key
        {
            return Err(anyhow!("storage 键名必须互不相同"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.handle_min_len == 0 {
            return Err(anyhow!("auth.handle_min_len 必须 >= 1"));
        }
        if self.handle_max_len < self.handle_min_len {
            return Err(anyhow!("auth.handle_max_len 必须 >= handle_min_len"));
        }
        Ok(())
    }
}

impl StateConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.initial_state.trim().is_empty() {
            self.initial_state = default_initial_state();
        }
        if self.history_limit == 0 {
            return Err(anyhow!("state.history_limit 必须 >= 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() -> Result<()> {
        let mut cfg: AppConfig = toml::from_str("")?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.storage.backend, StorageBackend::File);
        assert_eq!(cfg.storage.session_key, "wallet.session");
        assert_eq!(cfg.state.initial_state, "guest");
        assert_eq!(cfg.state.history_limit, 100);
        assert_eq!(cfg.logging.format, "compact");
        Ok(())
    }

    #[test]
    fn partial_sections_keep_field_defaults() -> Result<()> {
        let src = r#"
            [storage]
            backend = "memory"
            tokens_key = "app.tokens"

            [state]
            history_limit = 10

            [logging]
            format = "json"
        "#;
        let mut cfg: AppConfig = toml::from_str(src)?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.storage.tokens_key, "app.tokens");
        assert_eq!(cfg.storage.transactions_key, "wallet.transactions");
        assert_eq!(cfg.state.history_limit, 10);
        assert_eq!(cfg.logging.format, "json");
        Ok(())
    }

    #[test]
    fn rejects_duplicate_storage_keys() {
        let mut cfg = AppConfig::default();
        cfg.storage.tokens_key = cfg.storage.session_key.clone();
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn rejects_zero_history_limit() {
        let mut cfg = AppConfig::default();
        cfg.state.history_limit = 0;
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn rejects_inverted_handle_bounds() {
        let mut cfg = AppConfig::default();
        cfg.auth.handle_min_len = 10;
        cfg.auth.handle_max_len = 3;
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn blank_initial_state_falls_back() -> Result<()> {
        let mut cfg = AppConfig::default();
        cfg.state.initial_state = "  ".into();
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.state.initial_state, "guest");
        Ok(())
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_from_file("/nonexistent/wallet_coordinator/config.toml").unwrap_err();
        assert!(is_not_found(&err));
    }
}
