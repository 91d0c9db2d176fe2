use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    pub fn sqlite_path(&self) -> Option<String> {
        let url = self.connection_string();
        if url.is_empty() {
            None
        } else {
            Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Broadcast buffer per chat channel; a subscriber lagging past this
    /// many updates resynchronizes from a full snapshot.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout_ms(),
            write_retries: default_write_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "service.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.database.sqlite_path().is_none() {
            return Err(ConfigError::InvalidConfig(
                "database filename or url must be set".to_string(),
            ));
        }

        if self.chat.channel_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "chat.channel_capacity must be at least 1".to_string(),
            ));
        }

        if self.limits.write_retries == 0 {
            return Err(ConfigError::InvalidConfig(
                "limits.write_retries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("HEARTLINE_DATABASE_FILE") {
            self.database.filename = Some(value);
            self.database.url = None;
        }
        if let Ok(value) = std::env::var("HEARTLINE_BIND_ADDRESS") {
            self.service.bind_address = value;
        }
        if let Ok(value) = std::env::var("HEARTLINE_PORT")
            && let Ok(port) = value.parse()
        {
            self.service.port = port;
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8700
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

fn default_max_message_bytes() -> usize {
    4096
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_write_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    250
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn minimal_yaml_fills_documented_defaults() {
        let config: Config = serde_yaml::from_str("database:\n  filename: heartline.db\n")
            .expect("minimal config parses");
        config.validate().expect("minimal config is valid");

        assert_eq!(config.service.bind_address, "0.0.0.0");
        assert_eq!(config.service.port, 8700);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.chat.channel_capacity, 256);
        assert_eq!(config.chat.max_message_bytes, 4096);
        assert_eq!(config.limits.write_timeout_ms, 5000);
        assert_eq!(config.limits.write_retries, 3);
        assert_eq!(config.limits.retry_backoff_ms, 250);
        assert_eq!(config.database.sqlite_path().as_deref(), Some("heartline.db"));
    }

    #[test]
    fn sqlite_url_strips_scheme_prefix() {
        let config: Config =
            serde_yaml::from_str("database:\n  url: sqlite:///var/lib/heartline.db\n")
                .expect("config parses");
        assert_eq!(
            config.database.sqlite_path().as_deref(),
            Some("/var/lib/heartline.db")
        );
    }

    #[test]
    fn missing_database_is_rejected() {
        let config: Config =
            serde_yaml::from_str("database: {}\n").expect("config parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let config: Config = serde_yaml::from_str(
            "database:\n  filename: heartline.db\nlimits:\n  write_retries: 0\n",
        )
        .expect("config parses");
        assert!(config.validate().is_err());
    }
}
