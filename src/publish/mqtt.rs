//! MQTT report publisher.
//!
//! Reports go to `<topic>` at QoS 1. Availability is announced on
//! `<topic>/status` (`online` on start, `offline` as the retained last will).
//! Publishing never blocks the loop: when the client request queue is full
//! the report is rejected with `PublishError::Transport`.

use rumqttc::v5::mqttbytes::v5::LastWill;
use rumqttc::v5::{mqttbytes::QoS, Client, ClientError, Connection, Event, MqttOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::endpoint::{build_transport, parse_mqtt_endpoint, validate_loopback_addr};
use super::ReportPublisher;
use crate::config::MqttSettings;
use crate::error::{InitError, PublishError};

const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

pub struct MqttPublisher {
    client: Client,
    topic: String,
    status_topic: String,
    broker: String,
    shutting_down: Arc<AtomicBool>,
    connection_handle: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    pub fn connect(settings: &MqttSettings, topic: &str) -> Result<Self, InitError> {
        let endpoint = parse_mqtt_endpoint(&settings.broker_addr, settings.use_tls)
            .map_err(|e| InitError::Publisher(format!("{:#}", e)))?;
        if !settings.allow_remote {
            validate_loopback_addr(&endpoint, &settings.broker_addr)
                .map_err(|e| InitError::Publisher(e.to_string()))?;
        }
        let transport = build_transport(&endpoint, settings.tls_ca_path.as_deref())
            .map_err(|e| InitError::Publisher(format!("{:#}", e)))?;

        let status_topic = format!("{}/status", topic);
        let mut options = MqttOptions::new(&settings.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_start(true);
        if let Some(user) = settings.username.as_deref() {
            options.set_credentials(user, settings.password.as_deref().unwrap_or_default());
        }
        options.set_last_will(LastWill::new(
            status_topic.as_str(),
            PAYLOAD_OFFLINE.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
            None,
        ));
        options.set_transport(transport);

        let (client, connection) = Client::new(options, settings.queue_capacity);
        let shutting_down = Arc::new(AtomicBool::new(false));
        let handle = spawn_connection(connection, Arc::clone(&shutting_down));

        client
            .try_publish(
                status_topic.as_str(),
                QoS::AtLeastOnce,
                true,
                PAYLOAD_ONLINE.as_bytes().to_vec(),
            )
            .map_err(|e| InitError::Publisher(e.to_string()))?;

        log::info!(
            "MQTT publisher for '{}' on {}:{} (TLS: {}, auth: {})",
            topic,
            endpoint.host,
            endpoint.port,
            endpoint.use_tls,
            settings.username.is_some()
        );

        Ok(Self {
            client,
            topic: topic.to_string(),
            status_topic,
            broker: format!("{}:{}", endpoint.host, endpoint.port),
            shutting_down,
            connection_handle: Some(handle),
        })
    }
}

fn spawn_connection(mut connection: Connection, shutting_down: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                Err(e) => {
                    if shutting_down.load(Ordering::SeqCst) {
                        break;
                    }
                    log::warn!("MQTT connection error: {}", e);
                    std::thread::sleep(RECONNECT_BACKOFF);
                }
            }
        }
    })
}

fn map_client_error(err: ClientError) -> PublishError {
    match err {
        ClientError::TryRequest(_) => PublishError::Transport("MQTT request queue is full".into()),
        _ => PublishError::Disconnected,
    }
}

impl ReportPublisher for MqttPublisher {
    fn publish(&mut self, message: &str) -> Result<(), PublishError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PublishError::Disconnected);
        }
        self.client
            .try_publish(
                self.topic.as_str(),
                QoS::AtLeastOnce,
                false,
                message.as_bytes().to_vec(),
            )
            .map_err(map_client_error)
    }

    fn describe(&self) -> String {
        format!("mqtt://{}/{}", self.broker, self.topic)
    }

    fn close(&mut self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.client.try_publish(
            self.status_topic.as_str(),
            QoS::AtLeastOnce,
            true,
            PAYLOAD_OFFLINE.as_bytes().to_vec(),
        );
        if let Err(e) = self.client.try_disconnect() {
            log::warn!("MQTT disconnect failed: {}", e);
        }
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
        log::info!("MQTT publisher for '{}' closed", self.topic);
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.close();
    }
}
