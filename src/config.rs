use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 应用配置
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sieg: SiegConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许的跨域来源, 逗号分隔; "*" 表示任意来源
    pub cors_origins: String,
}

/// 上游 SIEG 配置 (凭证在启动时注入客户端)
#[derive(Clone, Serialize, Deserialize)]
pub struct SiegConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// 仅对 GET 请求生效
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl SiegConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                cors_origins: "*".to_string(),
            },
            sieg: SiegConfig {
                base_url: "https://api.sieg.com/api/v1".to_string(),
                token: String::new(),
                timeout_secs: 30,
                connect_timeout_secs: 5,
                max_retries: 2,
                retry_backoff_ms: 200,
            },
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> config/gateway.* -> 环境变量 (GATEWAY__SIEG__TOKEN 等)
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.cors_origins", defaults.server.cors_origins)?
            .set_default("sieg.base_url", defaults.sieg.base_url)?
            .set_default("sieg.token", defaults.sieg.token)?
            .set_default("sieg.timeout_secs", defaults.sieg.timeout_secs as i64)?
            .set_default("sieg.connect_timeout_secs", defaults.sieg.connect_timeout_secs as i64)?
            .set_default("sieg.max_retries", i64::from(defaults.sieg.max_retries))?
            .set_default("sieg.retry_backoff_ms", defaults.sieg.retry_backoff_ms as i64)?
            .add_source(File::with_name("config/gateway").required(false))
            .add_source(Environment::with_prefix("GATEWAY").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sieg.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "sieg.token is required (set GATEWAY__SIEG__TOKEN)".to_string(),
            ));
        }
        if self.sieg.base_url.trim().is_empty() {
            return Err(ConfigError::Message("sieg.base_url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// token 不出现在日志里
impl fmt::Debug for SiegConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiegConfig")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("sieg", &self.sieg)
            .finish()
    }
}
