use super::ReportPublisher;
use crate::error::PublishError;

/// Publishes reports to the process log under the `publish` target.
pub struct LogPublisher {
    topic: String,
    published: u64,
}

impl LogPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl ReportPublisher for LogPublisher {
    fn publish(&mut self, message: &str) -> Result<(), PublishError> {
        log::info!(target: "publish", "[{}] {}", self.topic, message.trim_end());
        self.published += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("log:{}", self.topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_published_messages() {
        let mut publisher = LogPublisher::new("detections");
        publisher.publish("detected 0 objects in image\n").unwrap();
        publisher.publish("detected 1 objects in image\n").unwrap();
        assert_eq!(publisher.published(), 2);
        assert_eq!(publisher.describe(), "log:detections");
    }
}
