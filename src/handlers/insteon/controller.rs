use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use std::time::Duration;

use crate::configuration::config::{ChargerConfig, HubConfig};
use crate::engine::ChargerSwitch;
use crate::error::ActuationFailure;
use crate::models::insteon_models::{InsteonCommand, Outlet};

// --------------------------------------------------------------------------------------------------------------

pub fn build_hub_client(config: &HubConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
}

/// Send one direct command to the Insteon hub.
/// Returns Ok(()) on HTTP 2xx. No retry.
pub async fn send_command(client: &Client, hub: &HubConfig, cmd: &InsteonCommand) -> Result<(), ActuationFailure> {
    let url = format!("{}{}", hub.url.trim_end_matches('/'), cmd.to_path());

    let response = client
        .get(&url)
        .basic_auth(&hub.username, Some(&hub.password))
        .send()
        .await
        .map_err(|e| ActuationFailure::Transport(e.to_string()))?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(ActuationFailure::Rejected { status: response.status().as_u16() })
    }
}

// --------------------------------------------------------------------------------------------------------------

/// On/off outlet module the load is plugged into.
pub struct SwitchActuator {
    client:  Client,
    hub:     HubConfig,
    charger: ChargerConfig,
}

impl SwitchActuator {
    pub fn new(client: Client, hub: HubConfig, charger: ChargerConfig) -> Self {
        Self { client, hub, charger }
    }

    /// Switch one plug of the charger's outlet module.
    /// The engine only drives the configured plug; the other one is reachable for auxiliary loads.
    pub async fn set_outlet(&self, outlet: Outlet, on: bool) -> Result<bool, ActuationFailure> {
        let cmd = InsteonCommand::outlet(&self.charger.device_id, outlet, on);
        match send_command(&self.client, &self.hub, &cmd).await {
            Ok(()) => {
                info!("[Switch] {:?} outlet {} confirmed", outlet, if on { "ON" } else { "OFF" });
                Ok(on)
            }
            Err(e) => {
                error!("[Switch] Failed turning {:?} outlet {}: {}", outlet, if on { "on" } else { "off" }, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ChargerSwitch for SwitchActuator {
    async fn set_state(&self, on: bool) -> Result<bool, ActuationFailure> {
        self.set_outlet(self.charger.outlet, on).await
    }
}

// --------------------------------------------------------------------------------------------------------------
