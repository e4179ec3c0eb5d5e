use std::{env, fmt, fs, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use smard_client::{Category, Resolution};

const CONFIG_ENV: &str = "SMARD_BRIDGE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "smard-bridge.toml";
const BROKER_ENV: &str = "MQTT_SERVER";
const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub server: Option<String>,
    pub topic_namespace: String,
    pub client_id_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            server: None,
            topic_namespace: "smard".to_string(),
            client_id_prefix: "smard".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmardConfig {
    pub base_url: String,
    pub region: String,
    pub resolution: Resolution,
}

impl Default for SmardConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.smard.de".to_string(),
            region: "DE".to_string(),
            resolution: Resolution::Quarterhour,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub window_hours: u64,
    pub interval_secs: u64,
    pub categories: Vec<Category>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_hours: 6,
            interval_secs: 300,
            categories: Category::ALL.to_vec(),
        }
    }
}

impl ScheduleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_hours * 3600)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub smard: SmardConfig,
    pub schedule: ScheduleConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load from `$SMARD_BRIDGE_CONFIG`, else `smard-bridge.toml` if present,
    /// else built-in defaults. `$MQTT_SERVER` overrides the broker address.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            Err(_) => Self::default(),
        };

        Ok(cfg.with_mqtt_server(env::var(BROKER_ENV).ok()))
    }

    fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("parsing config {path}"))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn with_mqtt_server(mut self, server: Option<String>) -> Self {
        if let Some(server) = server.filter(|s| !s.trim().is_empty()) {
            self.mqtt.server = Some(server);
        }
        self
    }

    pub fn broker(&self) -> anyhow::Result<BrokerAddress> {
        let server = self
            .mqtt
            .server
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no MQTT broker configured; set {BROKER_ENV} or mqtt.server"))?;
        Ok(server.parse()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BrokerAddressError {
    #[error("unsupported broker scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("missing broker host")]
    MissingHost,
    #[error("invalid broker port '{0}'")]
    InvalidPort(String),
    #[error("invalid broker host '{0}'; IPv6 addresses need brackets")]
    InvalidHost(String),
}

fn parse_port(port: &str) -> Result<u16, BrokerAddressError> {
    port.parse()
        .map_err(|_| BrokerAddressError::InvalidPort(port.to_string()))
}

impl FromStr for BrokerAddress {
    type Err = BrokerAddressError;

    /// Accepts `tcp://host:port`, `mqtt://host:port` or `host[:port]`;
    /// IPv6 hosts are written in brackets, e.g. `tcp://[::1]:1883`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let rest = match s.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "tcp" | "mqtt" => rest,
                other => return Err(BrokerAddressError::UnsupportedScheme(other.to_string())),
            },
            None => s,
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| BrokerAddressError::InvalidHost(rest.to_string()))?;
            let port = match tail {
                "" => DEFAULT_MQTT_PORT,
                tail => match tail.strip_prefix(':') {
                    Some(port) => parse_port(port)?,
                    None => return Err(BrokerAddressError::InvalidHost(rest.to_string())),
                },
            };
            (host, port)
        } else {
            match rest.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => {
                    return Err(BrokerAddressError::InvalidHost(rest.to_string()))
                }
                Some((host, port)) => (host, parse_port(port)?),
                None => (rest, DEFAULT_MQTT_PORT),
            }
        };

        if host.is_empty() {
            return Err(BrokerAddressError::MissingHost);
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
