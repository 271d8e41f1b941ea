use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub static CONFIG: Lazy<AppConfig> =
    Lazy::new(|| AppConfig::load_config("skybridge").expect("Failed to load configuration"));

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub link: LinkConfig,
    pub web: WebConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Where setpoints and refresh pings are sent.
    pub drone_addr: SocketAddr,
    /// Local address the telemetry socket binds to.
    pub listen_addr: SocketAddr,
    #[serde(default = "default_min_command_interval_ms")]
    pub min_command_interval_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_command_interval_ms() -> u64 {
    50
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_staleness_ms() -> u64 {
    3000
}

impl LinkConfig {
    pub fn min_command_interval(&self) -> Duration {
        Duration::from_millis(self.min_command_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }

    /// Rejects intervals the link cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "link.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.staleness_ms == 0 {
            return Err(ConfigError::Message(
                "link.staleness_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drone_addr: SocketAddr::from(([192, 168, 43, 42], 2390)),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 2399)),
            min_command_interval_ms: default_min_command_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            staleness_ms: default_staleness_ms(),
        }
    }
}

pub trait LoadConfig {
    fn load_config(service_name: &str) -> Result<Self, ConfigError>
    where
        Self: Sized + serde::de::DeserializeOwned,
    {
        // Try development path first
        let dev_path = PathBuf::from("config");
        let prod_path = PathBuf::from("/etc/skybridge");

        let config_dir = if dev_path.join(format!("{}.toml", service_name)).exists() {
            dev_path
        } else if prod_path.join(format!("{}.toml", service_name)).exists() {
            prod_path
        } else {
            return Err(ConfigError::NotFound(format!(
                "Config file not found in {:?}",
                prod_path.join(format!("{}.toml", service_name))
            )));
        };

        Self::load_from_dir(&config_dir, service_name)
    }

    fn load_from_dir(config_dir: &Path, service_name: &str) -> Result<Self, ConfigError>
    where
        Self: Sized + serde::de::DeserializeOwned,
    {
        let config = Config::builder()
            // Base config first (if it exists)
            .add_source(File::from(config_dir.join("base.toml")).required(false))
            // Service-specific config (required)
            .add_source(File::from(
                config_dir.join(format!("{}.toml", service_name)),
            ))
            // Environment variables override, e.g. SKYBRIDGE__LINK__DRONE_ADDR
            .add_source(
                Environment::with_prefix("SKYBRIDGE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl LoadConfig for AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.link.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_from_dir_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("skybridge.toml"),
            r#"
            [link]
            drone_addr = "127.0.0.1:2390"
            listen_addr = "127.0.0.1:2399"

            [web]
            host = "127.0.0.1"
            port = 3000
            "#,
        )
        .unwrap();

        let config = AppConfig::load_from_dir(dir.path(), "skybridge").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.link.min_command_interval(), Duration::from_millis(50));
        assert_eq!(config.link.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.link.staleness_window(), Duration::from_secs(3));
        assert_eq!(config.web.port, 3000);
    }

    #[test]
    fn test_base_file_is_overridden_by_service_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.toml"), "log_level = \"warn\"\n").unwrap();
        fs::write(
            dir.path().join("skybridge.toml"),
            r#"
            log_level = "debug"

            [link]
            drone_addr = "10.0.0.2:2390"
            listen_addr = "0.0.0.0:2399"
            poll_interval_ms = 250

            [web]
            host = "0.0.0.0"
            port = 8080
            "#,
        )
        .unwrap();

        let config = AppConfig::load_from_dir(dir.path(), "skybridge").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.link.drone_addr, "10.0.0.2:2390".parse().unwrap());
        assert_eq!(config.link.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("skybridge.toml"),
            r#"
            [link]
            drone_addr = "127.0.0.1:2390"
            listen_addr = "127.0.0.1:2399"
            poll_interval_ms = 0

            [web]
            host = "127.0.0.1"
            port = 3000
            "#,
        )
        .unwrap();

        let err = AppConfig::load_from_dir(dir.path(), "skybridge").unwrap_err();
        assert!(matches!(err, ConfigError::Message(_)));
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_link_validate() {
        assert!(LinkConfig::default().validate().is_ok());
        let stale_at_once = LinkConfig {
            staleness_ms: 0,
            ..Default::default()
        };
        assert!(stale_at_once.validate().is_err());
    }

    #[test]
    fn test_missing_service_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load_from_dir(dir.path(), "skybridge").is_err());
    }
}
