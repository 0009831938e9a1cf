//! detector_node - run the perception loop on a camera or video stream
//!
//! This binary:
//! 1. Resolves `LoopConfig` (defaults, config file, environment, CLI flags)
//! 2. Opens the input, output, detector network and report publisher
//! 3. Ticks at `--fps` until a stream ends or Ctrl-C is pressed
//!
//! Exit status is 0 on stream end or Ctrl-C, non-zero on startup or tick failure.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use perception_loop::{DetectorRegistry, LoopConfig, PerceptionLoop, PublisherKind};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "detector_node",
    version,
    about = "Capture frames, detect objects, publish reports, render overlays"
)]
struct Args {
    /// Input stream URI (stub://, file://, rtsp://, v4l2:///dev/videoN, csi://N).
    input_uri: Option<String>,

    /// Output URI (null://, stub://, display://).
    output_uri: Option<String>,

    /// Detection network: synthetic, motion, or an ONNX model name/path.
    #[arg(long)]
    network: Option<String>,

    /// Overlay flags: comma-separated box, labels, conf, or none.
    #[arg(long)]
    overlay: Option<String>,

    /// Minimum detection confidence (0.0 - 1.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// Tick rate in frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "DETECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Topic the detection reports are published on.
    #[arg(long)]
    topic: Option<String>,

    /// Report format: text or json.
    #[arg(long)]
    format: Option<String>,

    /// Report publisher: log, mqtt, or none.
    #[arg(long)]
    publisher: Option<String>,

    /// MQTT broker address.
    #[arg(long, env = "MQTT_BROKER_ADDR")]
    mqtt_broker_addr: Option<String>,

    /// Allow non-loopback MQTT connections.
    #[arg(long, env = "ALLOW_REMOTE_MQTT")]
    allow_remote_mqtt: bool,

    /// MQTT username for authentication.
    #[arg(long, env = "MQTT_USERNAME")]
    mqtt_username: Option<String>,

    /// MQTT password for authentication.
    #[arg(long, env = "MQTT_PASSWORD")]
    mqtt_password: Option<String>,

    /// MQTT client identifier.
    #[arg(long, env = "MQTT_CLIENT_ID")]
    mqtt_client_id: Option<String>,

    /// Enable TLS for MQTT (implied by mqtts:// brokers).
    #[arg(long, env = "MQTT_USE_TLS")]
    mqtt_use_tls: bool,

    /// Path to a PEM-encoded CA certificate to trust for MQTT TLS.
    #[arg(long, env = "MQTT_TLS_CA_PATH")]
    mqtt_tls_ca_path: Option<PathBuf>,

    /// Startup output: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,

    /// Print the built-in networks and exit.
    #[arg(long)]
    list_networks: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    if args.list_networks {
        for name in DetectorRegistry::with_builtins().list() {
            println!("{}", name);
        }
        println!("<name> (ONNX model at <model_dir>/<name>.onnx)");
        return Ok(());
    }

    let config = {
        let _stage = ui.stage("Resolve configuration");
        resolve_config(&args)?
    };
    if config.publish.backend == PublisherKind::Mqtt && config.publish.mqtt.allow_remote {
        log::warn!("Remote MQTT enabled - ensure broker is in a trusted network");
    }

    let perception = {
        let stage = ui.stage("Open input, output and network");
        match PerceptionLoop::initialize(config) {
            Ok(perception) => perception,
            Err(err) => {
                stage.fail();
                return Err(err).context("detector_node failed to start");
            }
        }
    };

    let stop = perception.stop_handle();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, stopping after the current tick");
        stop.stop();
    })
    .context("error setting Ctrl-C handler")?;

    let summary = perception.run_at_configured_rate()?;
    log::info!(
        "detector_node stopped ({:?}): {} ticks, {} reports published, {} publish errors",
        summary.termination,
        summary.ticks,
        summary.reports_published,
        summary.stats.publish_errors
    );
    Ok(())
}

fn resolve_config(args: &Args) -> Result<LoopConfig> {
    let mut config = LoopConfig::load(args.config.as_deref())?;
    apply_cli(&mut config, args)?;
    config.validate()?;
    Ok(config)
}

/// Explicit CLI flags win over file and environment values.
fn apply_cli(config: &mut LoopConfig, args: &Args) -> Result<()> {
    if let Some(uri) = non_empty(&args.input_uri) {
        config.input_uri = uri;
    }
    if let Some(uri) = non_empty(&args.output_uri) {
        config.output_uri = uri;
    }
    if let Some(network) = non_empty(&args.network) {
        config.network = network;
    }
    if let Some(overlay) = &args.overlay {
        config.overlay = overlay.parse().context("invalid --overlay")?;
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(fps) = args.fps {
        config.tick_rate_hz = fps;
    }
    if let Some(topic) = &args.topic {
        config.publish.topic = topic.clone();
    }
    if let Some(format) = &args.format {
        config.publish.format = format.parse().context("invalid --format")?;
    }
    if let Some(publisher) = &args.publisher {
        config.publish.backend = publisher.parse().context("invalid --publisher")?;
    }

    let mqtt = &mut config.publish.mqtt;
    if let Some(addr) = &args.mqtt_broker_addr {
        mqtt.broker_addr = addr.clone();
    }
    if args.allow_remote_mqtt {
        mqtt.allow_remote = true;
    }
    if let Some(user) = &args.mqtt_username {
        mqtt.username = Some(user.clone());
    }
    if let Some(password) = &args.mqtt_password {
        mqtt.password = Some(password.clone());
    }
    if let Some(client_id) = &args.mqtt_client_id {
        mqtt.client_id = client_id.clone();
    }
    if args.mqtt_use_tls {
        mqtt.use_tls = true;
    }
    if let Some(path) = &args.mqtt_tls_ca_path {
        mqtt.tls_ca_path = Some(path.clone());
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}
