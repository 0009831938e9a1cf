use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::overlay::OverlayFlags;
use crate::report::ReportFormat;

const DEFAULT_NETWORK: &str = "ssd-mobilenet-v2";
const DEFAULT_INPUT_URI: &str = "stub://camera";
const DEFAULT_OUTPUT_URI: &str = "null://";
const DEFAULT_THRESHOLD: f64 = 0.5;
const DEFAULT_TICK_RATE_HZ: u32 = 30;
const DEFAULT_MODEL_DIR: &str = "networks";
const DEFAULT_MODEL_INPUT: u32 = 300;
const MAX_MODEL_INPUT: u32 = 4096;
const DEFAULT_TOPIC: &str = "detections";
const DEFAULT_MQTT_BROKER: &str = "127.0.0.1:1883";
const DEFAULT_MQTT_CLIENT_ID: &str = "detector_node";
const DEFAULT_QUEUE_CAPACITY: usize = 10;
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct LoopConfigFile {
    network: Option<String>,
    input_uri: Option<String>,
    output_uri: Option<String>,
    overlay: Option<String>,
    threshold: Option<f64>,
    tick_rate_hz: Option<u32>,
    status_interval_secs: Option<u64>,
    model: Option<ModelConfigFile>,
    publish: Option<PublishConfigFile>,
    policy: Option<PolicyConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    dir: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PublishConfigFile {
    backend: Option<String>,
    topic: Option<String>,
    format: Option<String>,
    mqtt: Option<MqttConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    broker_addr: Option<String>,
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    use_tls: Option<bool>,
    tls_ca_path: Option<PathBuf>,
    allow_remote: Option<bool>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct PolicyConfigFile {
    abort_on_publish_error: Option<bool>,
    abort_on_render_error: Option<bool>,
}

/// Immutable loop configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub network: String,
    pub input_uri: String,
    pub output_uri: String,
    pub overlay: OverlayFlags,
    pub threshold: f64,
    pub tick_rate_hz: u32,
    pub status_interval: Duration,
    pub model: ModelSettings,
    pub publish: PublishSettings,
    pub policy: ErrorPolicy,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub dir: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub backend: PublisherKind,
    pub topic: String,
    pub format: ReportFormat,
    pub mqtt: MqttSettings,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PublisherKind {
    #[default]
    Log,
    Mqtt,
    None,
}

impl std::str::FromStr for PublisherKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "mqtt" => Ok(Self::Mqtt),
            "none" | "off" => Ok(Self::None),
            other => Err(anyhow!(
                "unknown publisher '{}': expected 'log', 'mqtt' or 'none'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker_addr: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    /// PEM bundle for brokers signed by a private CA.
    pub tls_ca_path: Option<PathBuf>,
    pub allow_remote: bool,
    pub queue_capacity: usize,
}

/// Whether downstream emission failures abort the tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub abort_on_publish_error: bool,
    pub abort_on_render_error: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_file(LoopConfigFile::default()).expect("empty config file resolves to defaults")
    }
}

impl LoopConfig {
    /// Resolve configuration from an optional file (or `DETECTOR_CONFIG`),
    /// then environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("DETECTOR_CONFIG").ok().map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Seconds between ticks at the configured rate.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }

    fn from_file(file: LoopConfigFile) -> Result<Self> {
        let overlay = match file.overlay.as_deref() {
            Some(raw) => raw.parse()?,
            None => OverlayFlags::default(),
        };
        let model = ModelSettings {
            dir: file
                .model
                .as_ref()
                .and_then(|m| m.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            input_width: file
                .model
                .as_ref()
                .and_then(|m| m.input_width)
                .unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: file
                .model
                .as_ref()
                .and_then(|m| m.input_height)
                .unwrap_or(DEFAULT_MODEL_INPUT),
        };

        let publish_file = file.publish.unwrap_or_default();
        let mqtt_file = publish_file.mqtt.unwrap_or_default();
        let publish = PublishSettings {
            backend: match publish_file.backend.as_deref() {
                Some(raw) => raw.parse()?,
                None => PublisherKind::default(),
            },
            topic: publish_file
                .topic
                .unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            format: match publish_file.format.as_deref() {
                Some(raw) => raw.parse()?,
                None => ReportFormat::default(),
            },
            mqtt: MqttSettings {
                broker_addr: mqtt_file
                    .broker_addr
                    .unwrap_or_else(|| DEFAULT_MQTT_BROKER.to_string()),
                client_id: mqtt_file
                    .client_id
                    .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
                username: mqtt_file.username,
                password: mqtt_file.password,
                use_tls: mqtt_file.use_tls.unwrap_or(false),
                tls_ca_path: mqtt_file.tls_ca_path,
                allow_remote: mqtt_file.allow_remote.unwrap_or(false),
                queue_capacity: mqtt_file.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            },
        };

        let policy = ErrorPolicy {
            abort_on_publish_error: file
                .policy
                .as_ref()
                .and_then(|p| p.abort_on_publish_error)
                .unwrap_or(false),
            abort_on_render_error: file
                .policy
                .as_ref()
                .and_then(|p| p.abort_on_render_error)
                .unwrap_or(false),
        };

        Ok(Self {
            network: file.network.unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
            input_uri: non_empty_or(file.input_uri, DEFAULT_INPUT_URI),
            output_uri: non_empty_or(file.output_uri, DEFAULT_OUTPUT_URI),
            overlay,
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            tick_rate_hz: file.tick_rate_hz.unwrap_or(DEFAULT_TICK_RATE_HZ),
            status_interval: Duration::from_secs(
                file.status_interval_secs
                    .unwrap_or(DEFAULT_STATUS_INTERVAL_SECS),
            ),
            model,
            publish,
            policy,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(network) = env_non_empty("DETECTOR_NETWORK") {
            self.network = network;
        }
        if let Some(uri) = env_non_empty("DETECTOR_INPUT_URI") {
            self.input_uri = uri;
        }
        if let Some(uri) = env_non_empty("DETECTOR_OUTPUT_URI") {
            self.output_uri = uri;
        }
        if let Some(overlay) = env_non_empty("DETECTOR_OVERLAY") {
            self.overlay = overlay
                .parse()
                .context("DETECTOR_OVERLAY is not a valid overlay flag list")?;
        }
        if let Some(threshold) = env_non_empty("DETECTOR_THRESHOLD") {
            self.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("DETECTOR_THRESHOLD must be a number between 0 and 1"))?;
        }
        if let Some(fps) = env_non_empty("DETECTOR_FPS") {
            self.tick_rate_hz = fps
                .parse()
                .map_err(|_| anyhow!("DETECTOR_FPS must be a positive integer"))?;
        }
        if let Some(topic) = env_non_empty("DETECTOR_TOPIC") {
            self.publish.topic = topic;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!(
                "threshold must be between 0.0 and 1.0 (got {})",
                self.threshold
            ));
        }
        if self.tick_rate_hz == 0 {
            return Err(anyhow!("tick rate must be greater than zero"));
        }
        if self.network.trim().is_empty() {
            return Err(anyhow!("network identifier must not be empty"));
        }
        if self.status_interval.is_zero() {
            return Err(anyhow!("status interval must be greater than zero"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!("model input dimensions must be non-zero"));
        }
        if self.model.input_width > MAX_MODEL_INPUT || self.model.input_height > MAX_MODEL_INPUT {
            return Err(anyhow!(
                "model input dimensions must be at most {} (got {}x{})",
                MAX_MODEL_INPUT,
                self.model.input_width,
                self.model.input_height
            ));
        }
        validate_topic(&self.publish.topic)?;
        if self.publish.mqtt.queue_capacity == 0 {
            return Err(anyhow!("mqtt queue capacity must be greater than zero"));
        }
        Ok(())
    }
}

/// Topics are plain names: no MQTT wildcards, no leading slash.
pub fn validate_topic(topic: &str) -> Result<()> {
    static TOPIC_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = TOPIC_RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_/-]{0,127}$").expect("valid topic regex")
    });
    if !re.is_match(topic) {
        return Err(anyhow!(
            "topic '{}' must match ^[A-Za-z0-9_][A-Za-z0-9_/-]{{0,127}}$",
            topic
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<LoopConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
