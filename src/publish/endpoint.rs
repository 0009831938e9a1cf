//! MQTT broker address handling.

use anyhow::{anyhow, Context, Result};
use rumqttc::Transport;
use std::path::Path;

/// Broker host, port and transport selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Parse `host:port`, `[v6]:port`, or a `mqtt://` / `mqtts://` URL.
///
/// `force_tls` upgrades a plain address to TLS.
pub fn parse_mqtt_endpoint(addr: &str, force_tls: bool) -> Result<MqttEndpoint> {
    let mut remainder = addr.trim();
    let mut use_tls = force_tls;
    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    if host.is_empty() {
        return Err(anyhow!("missing MQTT host in {}", addr));
    }
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid MQTT port in {}", addr))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid MQTT port in {}", addr))?;
    Ok((host.to_string(), port))
}

/// Reject non-loopback brokers unless remote publishing was allowed.
pub fn validate_loopback_addr(endpoint: &MqttEndpoint, addr: &str) -> Result<()> {
    let host = endpoint.host.as_str();
    if host == "localhost" {
        return Ok(());
    }
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        if ip.is_loopback() {
            return Ok(());
        }
    }
    Err(anyhow!(
        "MQTT broker must be loopback: {} (use --allow-remote-mqtt to override)",
        addr
    ))
}

/// Pick the rumqttc transport for `endpoint`.
pub fn build_transport(endpoint: &MqttEndpoint, ca_path: Option<&Path>) -> Result<Transport> {
    if !endpoint.use_tls {
        if let Some(path) = ca_path {
            return Err(anyhow!(
                "MQTT CA bundle {} provided but TLS is disabled (use --mqtt-use-tls or mqtts://)",
                path.display()
            ));
        }
        return Ok(Transport::tcp());
    }

    match ca_path {
        None => Ok(Transport::tls_with_default_config()),
        Some(path) => {
            let ca = std::fs::read(path)
                .with_context(|| format!("failed to read MQTT CA bundle {}", path.display()))?;
            Ok(Transport::tls(ca, None, None))
        }
    }
}
