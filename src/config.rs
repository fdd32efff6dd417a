use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::logging::{LogConfig, LogFormat, LogOutput};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "PYGCH_CONFIG";

const CONFIG_FILE_NAMES: [&str; 2] = [".pygch.toml", "pygch.toml"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GchConfig {
    /// Name of the host module holding the collector controls
    #[serde(default = "default_module")]
    pub module: String,

    #[serde(default)]
    pub flag_policy: FlagPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What happens to decoded flag values when the runtime is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagPolicy {
    /// Forget decoded flags together with the handles
    ResetOnTeardown,
    /// Keep decoded flags; they are plain integers, not host references
    RetainAcrossTeardown,
}

impl Default for FlagPolicy {
    fn default() -> Self {
        FlagPolicy::ResetOnTeardown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: String,

    /// Directory for daily-rotated log files; stderr when unset
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for GchConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            flag_policy: FlagPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            directory: None,
            filter: None,
        }
    }
}

fn default_module() -> String { "gc".to_string() }
fn default_level() -> String { "info".to_string() }
fn default_format() -> String { "compact".to_string() }

impl GchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Find and load a configuration file from the current directory or its parents
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            for name in CONFIG_FILE_NAMES {
                let config_path = dir.join(name);
                if config_path.exists() {
                    if let Ok(config) = Self::load(&config_path) {
                        return config;
                    }
                }
            }

            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// Use `PYGCH_CONFIG` if set, otherwise discover
    pub fn from_env() -> Self {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(Path::new(&path)).unwrap_or_else(|e| {
                tracing::warn!(path = %path, error = %e, "Ignoring unreadable config");
                Self::default()
            }),
            Err(_) => Self::discover(),
        }
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }
}

impl LoggingConfig {
    /// Translate into the logging layer's configuration
    pub fn to_log_config(&self) -> LogConfig {
        let mut config = LogConfig::new()
            .with_level(crate::logging::parse_level(&self.level))
            .with_format(match self.format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => LogFormat::Compact,
            });

        if let Some(directory) = &self.directory {
            config = config.with_output(LogOutput::File {
                directory: directory.clone(),
                prefix: "pygch".to_string(),
            });
        }

        if let Some(filter) = &self.filter {
            config = config.with_filter(filter.clone());
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_default_config() {
        let config = GchConfig::default();
        assert_eq!(config.module, "gc");
        assert_eq!(config.flag_policy, FlagPolicy::ResetOnTeardown);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
module = "gc"
flag_policy = "retain_across_teardown"

[logging]
level = "debug"
format = "json"
"#;

        let config = GchConfig::parse(toml).unwrap();
        assert_eq!(config.flag_policy, FlagPolicy::RetainAcrossTeardown);

        let log = config.logging.to_log_config();
        assert_eq!(log.level, Level::DEBUG);
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.output, LogOutput::Stderr);
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        assert!(GchConfig::parse("flag_policy = \"sometimes\"").is_err());
    }

    #[test]
    fn test_generated_default_parses() {
        let text = GchConfig::generate_default();
        assert_eq!(GchConfig::parse(&text).unwrap(), GchConfig::default());
    }
}
