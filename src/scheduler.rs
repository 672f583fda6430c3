use chrono::{Local, Timelike};
use log::{error, info, warn};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::configuration::config::{MeterConfig, StartupConfig};
use crate::engine::controller::{CycleOutcome, DecisionEngine};
use crate::engine::{ChargerSwitch, DemandSource, GatewayPower, Notify};
use crate::error::{ActuationFailure, StartupError};
use crate::handlers::eagle::reader::discover_mac_id;
use crate::models::charger_models::{ChargerEvent, ChargerMode};

// --------------------------------------------------------------------------------------------------------------
// Startup

/// Make sure the gateway has power and the charger is off before the first decision.
/// Failing to switch the charger off is the only fatal error of the controller.
pub async fn establish_startup_state<S, G, N>(
    switch:   &S,
    gateway:  &G,
    notifier: &N,
    startup:  &StartupConfig,
) -> Result<ChargerMode, StartupError>
where
    S: ChargerSwitch,
    G: GatewayPower,
    N: Notify,
{
    if gateway.power_on().await {
        info!("[Loop] Turned the gateway switch on at startup.");
    }

    let mut backoff = Duration::from_secs(startup.initial_backoff_seconds);
    let mut last_failure = None;
    for attempt in 1..=startup.switch_attempts {
        match switch.set_state(false).await {
            Ok(false) => {
                info!("[Loop] Turned the EV charger switch off at startup.");
                notifier.notify(ChargerEvent::OffStartup, 0.0).await;
                return Ok(ChargerMode::Off);
            }
            Ok(true) => {
                warn!("[Loop] Switch reported on after an off command (attempt {})", attempt);
                last_failure = Some(ActuationFailure::Unconfirmed);
            }
            Err(e) => {
                warn!(
                    "[Loop] Could not turn the EV charger switch off at startup (attempt {}/{}): {}",
                    attempt, startup.switch_attempts, e
                );
                last_failure = Some(e);
            }
        }
        if attempt < startup.switch_attempts {
            info!("[Loop] Retrying in {:?}...", backoff);
            sleep(backoff).await;
            backoff *= 2;
        }
    }

    Err(StartupError::SwitchOff {
        attempts: startup.switch_attempts,
        source:   last_failure.unwrap_or(ActuationFailure::Unconfirmed),
    })
}

/// Configured MAC, or ask the gateway until it answers. Never gives up.
pub async fn resolve_meter_address(client: &Client, config: &MeterConfig, retry_every: Duration) -> String {
    if let Some(mac) = config.mac_id.as_ref().filter(|m| !m.trim().is_empty()) {
        info!("[Loop] Using configured meter MAC {}", mac);
        return mac.trim().to_string();
    }

    loop {
        match discover_mac_id(client, config).await {
            Ok(mac) => return mac,
            Err(e) => {
                error!("[Loop] Meter discovery failed: {}. Retrying in {:?}.", e, retry_every);
                sleep(retry_every).await;
            }
        }
    }
}

// --------------------------------------------------------------------------------------------------------------
// Main loop

/// Time left in this interval, `None` if the cycle overran it.
pub fn remaining_sleep(elapsed: Duration, interval: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|d| !d.is_zero())
}

/// Run one cycle per interval, forever. Cycles never overlap.
pub async fn run<M, S, G, N>(mut engine: DecisionEngine<M, S, G, N>, interval: Duration)
where
    M: DemandSource,
    S: ChargerSwitch,
    G: GatewayPower,
    N: Notify,
{
    loop {
        let cycle_start = Instant::now();
        let hour = Local::now().hour();

        match engine.run_cycle(hour).await {
            CycleOutcome::Confirmed { mode, changed: true } => {
                info!("[Loop] Charger now {} (meter {:.3} kW).", mode, engine.demand_kw())
            }
            CycleOutcome::Confirmed { .. } => {}
            CycleOutcome::ReadSkipped => warn!("[Loop] Cycle skipped; charger stays {}.", engine.mode()),
            CycleOutcome::GatewayRebooted(kind) => warn!("[Loop] Gateway rebooted after '{}'.", kind),
            CycleOutcome::ActuationFailed { target } => {
                error!("[Loop] Could not switch to {}; charger stays {}.", target, engine.mode())
            }
        }

        let elapsed = cycle_start.elapsed();
        match remaining_sleep(elapsed, interval) {
            Some(remaining) => {
                info!("[Loop] Cycle done in {:?}. Sleeping {:?}.", elapsed, remaining);
                sleep(remaining).await;
            }
            None => warn!(
                "[Loop] Cycle took {:?}, overran interval {:?} - skipping sleep.",
                elapsed, interval
            ),
        }
    }
}

// --------------------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeGateway, FakeNotifier, FakeSwitch};
    use mockito::Server;

    fn startup(attempts: u32) -> StartupConfig {
        StartupConfig {
            switch_attempts:         attempts,
            initial_backoff_seconds: 0,
        }
    }

    #[tokio::test]
    async fn startup_powers_gateway_and_switches_off() {
        let (switch, gateway, notifier) = (FakeSwitch::default(), FakeGateway::default(), FakeNotifier::default());

        let mode = establish_startup_state(&switch, &gateway, &notifier, &startup(3)).await.unwrap();

        assert_eq!(mode, ChargerMode::Off);
        assert_eq!(gateway.power_ons(), 1);
        assert_eq!(switch.commands(), vec![false]);
        assert_eq!(notifier.events(), vec![ChargerEvent::OffStartup]);
    }

    #[tokio::test]
    async fn startup_retries_switch_off() {
        let switch = FakeSwitch::failing(vec![true, true]);
        let (gateway, notifier) = (FakeGateway::default(), FakeNotifier::default());

        let mode = establish_startup_state(&switch, &gateway, &notifier, &startup(3)).await.unwrap();

        assert_eq!(mode, ChargerMode::Off);
        assert_eq!(switch.commands(), vec![false, false, false]);
        assert_eq!(notifier.events(), vec![ChargerEvent::OffStartup]);
    }

    #[tokio::test]
    async fn startup_gives_up_after_configured_attempts() {
        let switch = FakeSwitch::failing(vec![true, true, true]);
        let (gateway, notifier) = (FakeGateway::default(), FakeNotifier::default());

        let result = establish_startup_state(&switch, &gateway, &notifier, &startup(2)).await;

        assert!(matches!(result, Err(StartupError::SwitchOff { attempts: 2, .. })));
        assert_eq!(switch.commands().len(), 2);
        assert!(notifier.events().is_empty());
    }

    #[tokio::test]
    async fn configured_mac_skips_discovery() {
        let config = MeterConfig {
            mac_id: Some(" 0xd8d5b90000005a54 ".to_string()),
            url:    "http://127.0.0.1:1".to_string(),
            ..MeterConfig::default()
        };
        let mac = resolve_meter_address(&Client::new(), &config, Duration::ZERO).await;
        assert_eq!(mac, "0xd8d5b90000005a54");
    }

    #[tokio::test]
    async fn missing_mac_is_discovered() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<DeviceList><DeviceInfo><DeviceMacId>0x0011</DeviceMacId></DeviceInfo></DeviceList>")
            .create_async()
            .await;

        let config = MeterConfig { url: server.url(), ..MeterConfig::default() };
        let mac = resolve_meter_address(&Client::new(), &config, Duration::ZERO).await;

        assert_eq!(mac, "0x0011");
        mock.assert_async().await;
    }

    #[test]
    fn sleeps_for_what_is_left_of_the_interval() {
        let interval = Duration::from_secs(120);
        assert_eq!(remaining_sleep(Duration::from_secs(20), interval), Some(Duration::from_secs(100)));
        assert_eq!(remaining_sleep(Duration::from_secs(120), interval), None);
        assert_eq!(remaining_sleep(Duration::from_secs(200), interval), None);
    }
}
