use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::Client;
use std::time::Duration;

use crate::configuration::config::MeterConfig;
use crate::engine::DemandSource;
use crate::error::{GatewayFaultKind, ReadFailure};
use crate::models::eagle_models::{instantaneous_demand_command, DeviceList, InstantaneousDemand, LIST_DEVICES_COMMAND};

// --------------------------------------------------------------------------------------------------------------

/// Build the HTTP client used for every gateway query.
pub fn build_meter_client(config: &MeterConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
}

/// POST one XML command to the gateway and return the raw reply body.
async fn post_command(client: &Client, config: &MeterConfig, body: String) -> Result<(reqwest::StatusCode, String), ReadFailure> {
    let response = client
        .post(&config.url)
        .header("Content-Type", "text/xml")
        .header("Cloud-Id", &config.cloud_id)
        .header("User", &config.user)
        .header("Password", &config.password)
        .body(body)
        .send()
        .await
        .map_err(|e| ReadFailure::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ReadFailure::Transport(e.to_string()))?;
    debug!("[Meter] HTTP {} reply:\n{}", status, text);
    Ok((status, text))
}

/// Work out why a reply did not contain the field we asked for.
fn classify_unparsable(status: reqwest::StatusCode, body: &str, reason: String) -> ReadFailure {
    if let Some(kind) = GatewayFaultKind::detect(body) {
        warn!("[Meter] Gateway answered '{}'", kind);
        return ReadFailure::GatewayFault(kind);
    }
    if !status.is_success() {
        return ReadFailure::Transport(format!("HTTP {}", status));
    }
    ReadFailure::UnparsableResponse(reason)
}

// --------------------------------------------------------------------------------------------------------------

/// Ask the gateway for its device list and return the first meter MAC address.
pub async fn discover_mac_id(client: &Client, config: &MeterConfig) -> Result<String, ReadFailure> {
    let (status, body) = post_command(client, config, LIST_DEVICES_COMMAND.to_string()).await?;

    let list = DeviceList::from_xml(&body)
        .map_err(|e| classify_unparsable(status, &body, format!("no <DeviceList>: {}", e)))?;

    match list.first_mac_id() {
        Some(mac) => {
            info!("[Meter] Discovered meter MAC {}", mac);
            Ok(mac.to_string())
        }
        None => Err(classify_unparsable(status, &body, "<DeviceList> has no <DeviceMacId>".to_string())),
    }
}

// --------------------------------------------------------------------------------------------------------------

/// Reads instantaneous demand from one metering device behind the Eagle gateway.
/// The MAC address is fixed for the life of the client.
pub struct MeterClient {
    client: Client,
    config: MeterConfig,
    mac_id: String,
}

impl MeterClient {
    pub fn new(client: Client, config: MeterConfig, mac_id: String) -> Self {
        Self { client, config, mac_id }
    }

    pub fn mac_id(&self) -> &str {
        &self.mac_id
    }

    /// One demand query. Never retries.
    pub async fn read_demand(&self) -> Result<f64, ReadFailure> {
        let body = instantaneous_demand_command(&self.mac_id);
        let (status, reply) = match post_command(&self.client, &self.config, body).await {
            Ok(r) => r,
            Err(e) => {
                error!("[Meter] {}", e);
                return Err(e);
            }
        };

        let parsed = InstantaneousDemand::from_xml(&reply).map_err(|e| {
            let failure = classify_unparsable(status, &reply, format!("no <Demand> token: {}", e));
            warn!("[Meter] No <Demand> token in reply: {}", reply.trim());
            failure
        })?;

        let demand_kw = parsed
            .demand_kw(self.config.encoding)
            .map_err(ReadFailure::UnparsableResponse)?;

        debug!(
            "[Meter] demand={} multiplier={:?} divisor={:?} -> {:.3} kW",
            parsed.demand, parsed.multiplier, parsed.divisor, demand_kw
        );
        Ok(demand_kw)
    }
}

#[async_trait]
impl DemandSource for MeterClient {
    async fn read(&self) -> Result<f64, ReadFailure> {
        self.read_demand().await
    }
}

// --------------------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::config::DemandEncoding;
    use mockito::{Matcher, Server};

    const MAC: &str = "0xd8d5b90000005a54";

    fn meter_config(url: String, encoding: DemandEncoding) -> MeterConfig {
        MeterConfig {
            url,
            cloud_id: "12345".to_string(),
            user:     "me@example.com".to_string(),
            password: "secret".to_string(),
            encoding,
            ..MeterConfig::default()
        }
    }

    fn meter(url: String, encoding: DemandEncoding) -> MeterClient {
        let config = meter_config(url, encoding);
        MeterClient::new(build_meter_client(&config).unwrap(), config, MAC.to_string())
    }

    #[tokio::test]
    async fn reads_hex_demand_with_auth_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/cgi-bin/post_manager")
            .match_header("content-type", "text/xml")
            .match_header("cloud-id", "12345")
            .match_header("user", "me@example.com")
            .match_header("password", "secret")
            .match_body(Matcher::Regex(format!("<MacId>{}</MacId>", MAC)))
            .with_status(200)
            .with_body(
                "<InstantaneousDemand><Demand>0x001738</Demand>\
                 <Multiplier>0x00000000</Multiplier><Divisor>0x000003e8</Divisor></InstantaneousDemand>",
            )
            .create_async()
            .await;

        let client = meter(format!("{}/cgi-bin/post_manager", server.url()), DemandEncoding::Hex);
        let kw = client.read().await.unwrap();

        assert!((kw - 5.944).abs() < 1e-9);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn reads_decimal_demand() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<InstantaneousDemand><Demand>-2.125</Demand></InstantaneousDemand>")
            .create_async()
            .await;

        let client = meter(server.url(), DemandEncoding::Decimal);
        let kw = client.read().await.unwrap();

        assert!((kw + 2.125).abs() < 1e-9);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn request_timeout_body_is_a_gateway_fault() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<html><head><title>408 Request Timeout</title></head></html>")
            .create_async()
            .await;

        let client = meter(server.url(), DemandEncoding::Hex);
        let result = client.read().await;

        assert!(matches!(result, Err(ReadFailure::GatewayFault(GatewayFaultKind::RequestTimeout))));
    }

    #[tokio::test]
    async fn service_unavailable_status_and_body_is_a_gateway_fault() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let client = meter(server.url(), DemandEncoding::Hex);
        let result = client.read().await;

        assert!(matches!(result, Err(ReadFailure::GatewayFault(GatewayFaultKind::ServiceUnavailable))));
    }

    #[tokio::test]
    async fn reply_without_demand_is_unparsable() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<Error><Text>Unknown MacId</Text></Error>")
            .create_async()
            .await;

        let client = meter(server.url(), DemandEncoding::Hex);
        assert!(matches!(client.read().await, Err(ReadFailure::UnparsableResponse(_))));
    }

    #[tokio::test]
    async fn http_error_without_signature_is_transport() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = meter(server.url(), DemandEncoding::Hex);
        assert!(matches!(client.read().await, Err(ReadFailure::Transport(_))));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport() {
        // nothing listens on port 1
        let client = meter("http://127.0.0.1:1/".to_string(), DemandEncoding::Hex);
        assert!(matches!(client.read().await, Err(ReadFailure::Transport(_))));
    }

    #[tokio::test]
    async fn discovers_first_device() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex("<Name>list_devices</Name>".to_string()))
            .with_status(200)
            .with_body(format!(
                "<DeviceList><DeviceInfo><DeviceMacId>{}</DeviceMacId></DeviceInfo></DeviceList>",
                MAC
            ))
            .create_async()
            .await;

        let config = meter_config(server.url(), DemandEncoding::Hex);
        let http = build_meter_client(&config).unwrap();
        let mac = discover_mac_id(&http, &config).await.unwrap();

        assert_eq!(mac, MAC);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn discovery_of_empty_list_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<DeviceList></DeviceList>")
            .create_async()
            .await;

        let config = meter_config(server.url(), DemandEncoding::Hex);
        let http = build_meter_client(&config).unwrap();
        assert!(discover_mac_id(&http, &config).await.is_err());
    }
}
