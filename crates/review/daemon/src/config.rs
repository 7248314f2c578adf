//! Configuration for reviewd

use review_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Templates, roles and policies handed to the engine
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: built-in defaults, then an optional file, then
    /// `REVIEW_`-prefixed environment variables (`REVIEW_SERVER__LISTEN_ADDR`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.listen_addr", default_listen_addr().to_string())?
            .set_default("server.enable_cors", true)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?;

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("REVIEW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(config.server.enable_cors);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.templates.len(), 3);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.server.listen_addr, default_listen_addr());
        assert!(!config.logging.json);
        assert_eq!(config.engine.max_reevaluations, 3);
    }

    #[test]
    fn test_engine_section_deserializes() {
        let config: DaemonConfig = serde_json::from_str(
            r#"{
                "server": { "listen_addr": "0.0.0.0:9000" },
                "engine": {
                    "resubmission": "require_new_version",
                    "roles": { "team-lead": [{ "id": "u-lee", "name": "Lee" }] }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.engine.roles["team-lead"][0].name, "Lee");
        assert_eq!(config.engine.templates.len(), 3);
    }
}
