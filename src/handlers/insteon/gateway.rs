use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;

use crate::configuration::config::{GatewayConfig, HubConfig};
use crate::engine::GatewayPower;
use crate::handlers::insteon::controller::send_command;
use crate::models::insteon_models::InsteonCommand;

// --------------------------------------------------------------------------------------------------------------

/// Power control for the Eagle gateway through the Insteon relay that feeds it.
pub struct GatewayRecovery {
    client:     Client,
    hub:        HubConfig,
    device_id:  String,
    off_delay:  Duration,
    boot_delay: Duration,
}

impl GatewayRecovery {
    pub fn new(client: Client, hub: HubConfig, gateway: &GatewayConfig) -> Self {
        Self {
            client,
            hub,
            device_id:  gateway.device_id.clone(),
            off_delay:  Duration::from_secs(gateway.off_delay_seconds),
            boot_delay: Duration::from_secs(gateway.boot_delay_seconds),
        }
    }

    pub fn boot_delay(&self) -> Duration {
        self.boot_delay
    }

    /// Flip the gateway's relay. Failures are logged and swallowed.
    pub async fn set_power(&self, on: bool) -> bool {
        let cmd = InsteonCommand::relay(&self.device_id, on);
        match send_command(&self.client, &self.hub, &cmd).await {
            Ok(()) => {
                info!("[Gateway] Turned the gateway switch {}.", if on { "on" } else { "off" });
                true
            }
            Err(e) => {
                error!("[Gateway] Failed to turn the gateway switch {}: {}", if on { "on" } else { "off" }, e);
                false
            }
        }
    }

    /// Power-cycle: off, short wait, on, wait for the gateway to boot.
    pub async fn power_cycle(&self) {
        self.set_power(false).await;
        info!("[Gateway] Waiting {:?} before turning the gateway switch back on...", self.off_delay);
        sleep(self.off_delay).await;

        self.set_power(true).await;
        info!("[Gateway] Waiting {:?} for the gateway to reboot...", self.boot_delay);
        sleep(self.boot_delay).await;
    }
}

#[async_trait]
impl GatewayPower for GatewayRecovery {
    async fn power_on(&self) -> bool {
        self.set_power(true).await
    }

    async fn reboot(&self) {
        self.power_cycle().await
    }
}

// --------------------------------------------------------------------------------------------------------------
