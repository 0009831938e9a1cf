//! Report publishing.
//!
//! One formatted report per processed frame goes to the configured topic.
//! Backends:
//! - `log`: info-level log line under the `publish` target
//! - `mqtt`: QoS 1 messages through rumqttc
//! - `none`: drop reports

pub mod endpoint;
mod logger;
mod mqtt;

pub use logger::LogPublisher;
pub use mqtt::MqttPublisher;

use crate::config::{PublishSettings, PublisherKind};
use crate::error::{InitError, PublishError};

/// Message publisher seam.
///
/// `publish` must not block the loop for longer than a bounded queue push.
pub trait ReportPublisher: Send {
    fn publish(&mut self, message: &str) -> Result<(), PublishError>;

    fn describe(&self) -> String;

    /// Flush and disconnect. Idempotent.
    fn close(&mut self) {}
}

/// Publisher that accepts and discards every report.
#[derive(Debug, Default)]
pub struct NoopPublisher;

impl ReportPublisher for NoopPublisher {
    fn publish(&mut self, _message: &str) -> Result<(), PublishError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

pub fn open_publisher(settings: &PublishSettings) -> Result<Box<dyn ReportPublisher>, InitError> {
    crate::config::validate_topic(&settings.topic)
        .map_err(|e| InitError::InvalidConfig(e.to_string()))?;
    match settings.backend {
        PublisherKind::Log => Ok(Box::new(LogPublisher::new(settings.topic.clone()))),
        PublisherKind::Mqtt => Ok(Box::new(MqttPublisher::connect(
            &settings.mqtt,
            &settings.topic,
        )?)),
        PublisherKind::None => Ok(Box::new(NoopPublisher)),
    }
}
