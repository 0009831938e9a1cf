use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use perception_loop::{LoopConfig, OverlayFlags, PublisherKind, ReportFormat};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DETECTOR_CONFIG",
        "DETECTOR_NETWORK",
        "DETECTOR_INPUT_URI",
        "DETECTOR_OUTPUT_URI",
        "DETECTOR_OVERLAY",
        "DETECTOR_THRESHOLD",
        "DETECTOR_FPS",
        "DETECTOR_TOPIC",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "network": "motion",
            "input_uri": "rtsp://camera-1/stream",
            "output_uri": "stub://window?frames=10",
            "overlay": "box,labels",
            "threshold": 0.35,
            "tick_rate_hz": 12,
            "status_interval_secs": 30,
            "model": { "dir": "/opt/models", "input_width": 512, "input_height": 384 },
            "publish": {
                "backend": "mqtt",
                "topic": "robot/detections",
                "format": "json",
                "mqtt": {
                    "broker_addr": "127.0.0.1:1884",
                    "client_id": "robot-7",
                    "queue_capacity": 32
                }
            },
            "policy": { "abort_on_publish_error": true }
        }"#,
    );

    std::env::set_var("DETECTOR_CONFIG", file.path());
    std::env::set_var("DETECTOR_THRESHOLD", "0.6");
    std::env::set_var("DETECTOR_TOPIC", "robot/override");

    let cfg = LoopConfig::load(None).expect("load config");

    assert_eq!(cfg.network, "motion");
    assert_eq!(cfg.input_uri, "rtsp://camera-1/stream");
    assert_eq!(cfg.output_uri, "stub://window?frames=10");
    assert_eq!(
        cfg.overlay,
        OverlayFlags {
            boxes: true,
            labels: true,
            confidence: false
        }
    );
    assert_eq!(cfg.threshold, 0.6);
    assert_eq!(cfg.tick_rate_hz, 12);
    assert_eq!(cfg.status_interval, Duration::from_secs(30));
    assert_eq!(cfg.model.dir, PathBuf::from("/opt/models"));
    assert_eq!(cfg.model.input_width, 512);
    assert_eq!(cfg.model.input_height, 384);
    assert_eq!(cfg.publish.backend, PublisherKind::Mqtt);
    assert_eq!(cfg.publish.topic, "robot/override");
    assert_eq!(cfg.publish.format, ReportFormat::Json);
    assert_eq!(cfg.publish.mqtt.broker_addr, "127.0.0.1:1884");
    assert_eq!(cfg.publish.mqtt.client_id, "robot-7");
    assert_eq!(cfg.publish.mqtt.queue_capacity, 32);
    assert!(cfg.policy.abort_on_publish_error);
    assert!(!cfg.policy.abort_on_render_error);

    clear_env();
}

#[test]
fn loads_toml_file_from_explicit_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
network = "synthetic"
input_uri = "stub://bench?frames=5"
tick_rate_hz = 60

[publish]
backend = "none"
"#,
    );

    let cfg = LoopConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.network, "synthetic");
    assert_eq!(cfg.input_uri, "stub://bench?frames=5");
    assert_eq!(cfg.output_uri, "null://");
    assert_eq!(cfg.tick_rate_hz, 60);
    assert_eq!(cfg.publish.backend, PublisherKind::None);
    assert_eq!(cfg.publish.topic, "detections");

    clear_env();
}

#[test]
fn env_overrides_apply_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DETECTOR_NETWORK", "motion");
    std::env::set_var("DETECTOR_INPUT_URI", "v4l2:///dev/video0");
    std::env::set_var("DETECTOR_OUTPUT_URI", "display://");
    std::env::set_var("DETECTOR_OVERLAY", "none");
    std::env::set_var("DETECTOR_FPS", "15");

    let cfg = LoopConfig::load(None).expect("load config");
    assert_eq!(cfg.network, "motion");
    assert_eq!(cfg.input_uri, "v4l2:///dev/video0");
    assert_eq!(cfg.output_uri, "display://");
    assert!(cfg.overlay.is_none());
    assert_eq!(cfg.tick_rate_hz, 15);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DETECTOR_THRESHOLD", "1.5");
    assert!(LoopConfig::load(None).is_err());
    clear_env();

    std::env::set_var("DETECTOR_TOPIC", "detections/+/all");
    assert!(LoopConfig::load(None).is_err());
    clear_env();

    std::env::set_var("DETECTOR_OVERLAY", "none,box");
    assert!(LoopConfig::load(None).is_err());
    clear_env();

    std::env::set_var("DETECTOR_FPS", "0");
    assert!(LoopConfig::load(None).is_err());
    clear_env();

    let file = write_config(".json", r#"{ "threshold": "high" }"#);
    assert!(LoopConfig::load(Some(file.path())).is_err());

    assert!(LoopConfig::load(Some(std::path::Path::new("/nonexistent/detector.json"))).is_err());

    clear_env();
}
