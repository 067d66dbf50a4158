use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat};
use serde::{Deserialize, Deserializer};
use std::env;
use validator::Validate;

use crate::sinks::SinkRegistry;

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const CONFIG_FILE_ENV: &str = "APP_CONFIG_FILE";
const DEFAULT_STREAM_PATH: &str = "/turbine.stream";
const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct TurbineConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    pub tls_enabled: bool,
    #[validate(length(min = 1))]
    #[serde(deserialize_with = "deserialize_clusters")]
    pub clusters: Vec<String>,
    #[validate(length(min = 1))]
    pub stream_path: String,
    #[validate(range(min = 1))]
    pub read_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub kind: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct StatsdConfig {
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    pub prefix: String,
    pub normalize_per_host: bool,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct InfluxDbConfig {
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub tls_enabled: bool,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct PipelineConfig {
    #[validate(range(min = 1))]
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LogConfig {
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct StatusConfig {
    pub enabled: bool,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub turbine: TurbineConfig,
    #[validate(nested)]
    pub backend: BackendConfig,
    #[validate(nested)]
    pub statsd: StatsdConfig,
    #[validate(nested)]
    pub influxdb: InfluxDbConfig,
    #[validate(nested)]
    pub pipeline: PipelineConfig,
    #[validate(nested)]
    pub log: LogConfig,
    #[validate(nested)]
    pub status: StatusConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClusterList {
    Joined(String),
    // a bare numeric id, as parsed from `APP_TURBINE__CLUSTERS=42`
    Numeric(i64),
    List(Vec<String>),
}

/// Accepts `"a, b"` as well as `["a", "b"]`; entries are trimmed and blanks
/// dropped.
fn deserialize_clusters<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match ClusterList::deserialize(deserializer)? {
        ClusterList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        ClusterList::Numeric(id) => vec![id.to_string()],
        ClusterList::List(list) => list,
    };
    Ok(raw
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect())
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("turbine.host", "")?
        .set_default("turbine.port", 80)?
        .set_default("turbine.tls_enabled", false)?
        .set_default("turbine.clusters", Vec::<String>::new())?
        .set_default("turbine.stream_path", DEFAULT_STREAM_PATH)?
        .set_default("turbine.read_timeout_secs", DEFAULT_READ_TIMEOUT_SECS)?
        .set_default("turbine.reconnect_delay_secs", DEFAULT_RECONNECT_DELAY_SECS)?
        .set_default("backend.type", "statsd")?
        .set_default("statsd.host", "")?
        .set_default("statsd.port", 8125)?
        .set_default("statsd.prefix", "hystrix")?
        .set_default("statsd.normalize_per_host", true)?
        .set_default("influxdb.host", "")?
        .set_default("influxdb.port", 8086)?
        .set_default("influxdb.username", "")?
        .set_default("influxdb.password", "")?
        .set_default("influxdb.database", "")?
        .set_default("influxdb.tls_enabled", false)?
        .set_default("pipeline.channel_capacity", 1)?
        .set_default("log.level", "info")?
        .set_default("log.format", "pretty")?
        .set_default("status.enabled", false)?
        .set_default("status.host", "127.0.0.1")?
        .set_default("status.port", 9102)
}

impl AppConfig {
    /// Loads defaults, then the TOML file named by `APP_CONFIG_FILE`
    /// (`config.toml` when unset, optional), then `APP_*` variables such as
    /// `APP_TURBINE__CLUSTERS=api,web`.
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let (path, required) = match env::var(CONFIG_FILE_ENV) {
            Ok(path) => (path, true),
            Err(_) => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        let builder = defaults()?
            .add_source(File::new(&path, FileFormat::Toml).required(required))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::finish(builder)
    }

    /// Loads defaults plus a TOML file that must exist, ignoring the
    /// environment.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::finish(defaults()?.add_source(File::new(path, FileFormat::Toml).required(true)))
    }

    /// Loads defaults plus the given TOML document, ignoring the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::finish(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.validate() {
            return Err(ConfigError::Message(format!("Validation error: {}", e)));
        }

        let registry = SinkRegistry::new();
        if !registry.contains(&self.backend.kind) {
            return Err(ConfigError::Message(format!(
                "{} is not a valid backend type (expected one of: {})",
                self.backend.kind,
                registry.names().join(", ")
            )));
        }

        match self.backend.kind.as_str() {
            "statsd" if self.statsd.host.is_empty() => Err(ConfigError::Message(
                "Must specify a StatsD host (statsd.host / APP_STATSD__HOST)".into(),
            )),
            "influxdb" if self.influxdb.host.is_empty() || self.influxdb.database.is_empty() => {
                Err(ConfigError::Message(
                    "Must specify influxdb.host and influxdb.database".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::from_toml_str(
            r#"
            [turbine]
            host = "turbine.internal"
            clusters = ["api"]

            [statsd]
            host = "127.0.0.1"

            [influxdb]
            host = "127.0.0.1"
            database = "hystrix"
            "#,
        )
        .expect("test configuration should be valid")
    }
}
