use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub reset: ResetConfig,

    pub mail: MailConfig,

    pub forum: ForumConfig,

    pub chat: ChatConfig,

    pub maintenance: MaintenanceConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    /// Login throttling and lockout policy.
    pub auth_throttle: AuthThrottleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthThrottleConfig {
    /// Failed attempts for one username inside the window that trigger a lock.
    pub max_attempts: u32,

    /// Trailing window for counting failures.
    pub window_seconds: u64,

    /// How long the account stays locked once the threshold is reached.
    pub lockout_seconds: u64,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address
    /// is recorded on login attempts.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for AuthThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 15 * 60,
            lockout_seconds: 15 * 60,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            auth_throttle: AuthThrottleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub token_ttl_seconds: u64,

    /// Public origin used to build the link in reset notifications.
    pub base_url: String,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: 60 * 60,
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// HTTP endpoint of the mail relay. When unset, reset links are only logged.
    pub webhook_url: Option<String>,

    pub from: String,

    pub request_timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            from: "no-reply@localhost".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    pub comments_per_page: u64,

    pub max_comment_length: usize,

    /// Color assigned to new accounts until they pick their own.
    pub default_profile_color: String,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            comments_per_page: 20,
            max_comment_length: 2000,
            default_profile_color: "#3b82f6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages replayed to a connection when it joins.
    pub history_limit: u64,

    pub max_message_length: usize,

    /// Events queued per connection before a slow reader is disconnected.
    pub buffer_size: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            max_message_length: 500,
            buffer_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,

    pub cron_expression: String,

    /// Reset tokens are deleted once they have been expired for this long.
    pub reset_token_retention_hours: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: "0 0 * * * *".to_string(),
            reset_token_retention_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "agora".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    pub port: u16,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    pub session_inactivity_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            secure_cookies: true,
            session_inactivity_minutes: 60,
        }
    }
}

/// Shape of the console log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    pub log_format: LogFormat,

    /// Directory served under `/public`.
    pub static_path: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/forum.db".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            static_path: "public".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            reset: ResetConfig::default(),
            mail: MailConfig::default(),
            forum: ForumConfig::default(),
            chat: ChatConfig::default(),
            maintenance: MaintenanceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Environment variables win over the config file (`.env` is loaded by the binary).
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.general.database_path = url;
        }

        if let Ok(base_url) = std::env::var("BASE_URL") {
            self.reset.base_url = base_url;
        }

        if let Ok(webhook) = std::env::var("MAIL_WEBHOOK_URL") {
            self.mail.webhook_url = Some(webhook);
        }

        if let Ok(from) = std::env::var("MAIL_FROM") {
            self.mail.from = from;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("agora").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".agora").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let throttle = &self.security.auth_throttle;
        if throttle.max_attempts == 0 {
            anyhow::bail!("security.auth_throttle.max_attempts must be > 0");
        }
        if throttle.window_seconds == 0 || throttle.lockout_seconds == 0 {
            anyhow::bail!("Lockout window and duration must be > 0");
        }

        if self.reset.token_ttl_seconds == 0 {
            anyhow::bail!("reset.token_ttl_seconds must be > 0");
        }

        if self.forum.comments_per_page == 0 {
            anyhow::bail!("forum.comments_per_page must be > 0");
        }

        if self.chat.history_limit == 0 {
            anyhow::bail!("chat.history_limit must be > 0");
        }

        if self.chat.buffer_size < 2 {
            anyhow::bail!("chat.buffer_size must be at least 2");
        }

        if self.server.session_inactivity_minutes <= 0 {
            anyhow::bail!("server.session_inactivity_minutes must be > 0");
        }

        if let Some(url) = &self.mail.webhook_url {
            url::Url::parse(url).context("Invalid mail.webhook_url")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.auth_throttle.max_attempts, 5);
        assert_eq!(config.security.auth_throttle.window_seconds, 900);
        assert_eq!(config.security.auth_throttle.lockout_seconds, 900);
        assert_eq!(config.reset.token_ttl_seconds, 3600);
        assert_eq!(config.forum.comments_per_page, 20);
        assert_eq!(config.chat.history_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security.auth_throttle]"));
        assert!(toml_str.contains("[chat]"));
        assert!(toml_str.contains(r#"log_format = "text""#));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"
            log_format = "json"

            [security.auth_throttle]
            max_attempts = 3
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, LogFormat::Json);
        assert_eq!(config.security.auth_throttle.max_attempts, 3);
        assert_eq!(config.security.auth_throttle.lockout_seconds, 900);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_validate_rejects_bad_webhook() {
        let mut config = Config::default();
        config.mail.webhook_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.auth_throttle.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chat.buffer_size = 1;
        assert!(config.validate().is_err());
    }
}
