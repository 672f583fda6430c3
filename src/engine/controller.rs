use log::{error, info, warn};

use super::policy::{failure_event, reboot_event, transition_event, Policy};
use super::{ChargerSwitch, DemandSource, GatewayPower, Notify};
use crate::error::{ActuationFailure, GatewayFaultKind, ReadFailure};
use crate::models::charger_models::ChargerMode;

// --------------------------------------------------------------------------------------------------------------

/// What a single cycle ended with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// The switch confirmed `mode`. `changed` is false when the cycle only reconfirmed it.
    Confirmed { mode: ChargerMode, changed: bool },
    /// Meter unreadable; nothing was switched.
    ReadSkipped,
    /// Meter answered with a fault signature; the gateway was power-cycled.
    GatewayRebooted(GatewayFaultKind),
    /// The switch did not confirm `target`; the stored mode is unchanged.
    ActuationFailed { target: ChargerMode },
}

/// The controller: holds the mode and the last reading, owns all device I/O.
pub struct DecisionEngine<M, S, G, N> {
    meter:    M,
    switch:   S,
    gateway:  G,
    notifier: N,
    policy:   Policy,
    /// Also read the meter in the value window, for logging only.
    read_in_value_window: bool,
    mode:      ChargerMode,
    demand_kw: f64,
}

impl<M, S, G, N> DecisionEngine<M, S, G, N>
where
    M: DemandSource,
    S: ChargerSwitch,
    G: GatewayPower,
    N: Notify,
{
    pub fn new(meter: M, switch: S, gateway: G, notifier: N, policy: Policy) -> Self {
        Self {
            meter,
            switch,
            gateway,
            notifier,
            policy,
            read_in_value_window: true,
            mode:      ChargerMode::Startup,
            demand_kw: 0.0,
        }
    }

    /// Start from a mode established outside the engine (the startup sequence).
    pub fn with_mode(mut self, mode: ChargerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_value_window_reads(mut self, enabled: bool) -> Self {
        self.read_in_value_window = enabled;
        self
    }

    pub fn mode(&self) -> ChargerMode {
        self.mode
    }

    /// Last successfully parsed demand, 0 after a failed read.
    pub fn demand_kw(&self) -> f64 {
        self.demand_kw
    }

    // ----------------------------------------------------------------------------------------------------------

    /// Evaluate and apply the policy once for local hour `hour`.
    pub async fn run_cycle(&mut self, hour: u32) -> CycleOutcome {
        if self.policy.in_value_window(hour) {
            return self.value_window_cycle().await;
        }

        let demand_kw = match self.read_meter().await {
            Ok(kw) => kw,
            Err(failure) => return self.handle_read_failure(failure).await,
        };

        let target = self.policy.peak_target(self.mode, demand_kw);
        let outcome = self.apply(target).await;
        if let CycleOutcome::Confirmed { mode, .. } = outcome {
            info!(
                "[Engine] Meter reading: {:.3} kW. EV charger switch is {}.",
                demand_kw,
                if mode.is_on() { "on" } else { "off" }
            );
        }
        outcome
    }

    async fn value_window_cycle(&mut self) -> CycleOutcome {
        let outcome = self.apply(ChargerMode::OnValueWindow).await;
        if !matches!(outcome, CycleOutcome::Confirmed { .. }) || !self.read_in_value_window {
            return outcome;
        }

        // Informational only: a failure here never touches the mode.
        match self.read_meter().await {
            Ok(kw) => info!(
                "[Engine] Meter reading: {:.3} kW. EV charger switch is on (value window).",
                kw
            ),
            Err(failure) => {
                self.handle_read_failure(failure).await;
            }
        }
        outcome
    }

    /// Drive the switch to `target` and, once confirmed, store it and notify.
    async fn apply(&mut self, target: ChargerMode) -> CycleOutcome {
        let previous = self.mode;
        let want_on  = target.is_on();

        let result = match self.switch.set_state(want_on).await {
            Ok(achieved) if achieved != want_on => Err(ActuationFailure::Unconfirmed),
            other => other,
        };

        if let Err(e) = result {
            error!("[Engine] Could not turn the EV charger switch {}: {}", if want_on { "on" } else { "off" }, e);
            self.notifier.notify(failure_event(target), self.demand_kw).await;
            return CycleOutcome::ActuationFailed { target };
        }

        self.mode = target;
        if let Some(event) = transition_event(previous, target) {
            info!("[Engine] Mode {} -> {} ({:?})", previous, target, event);
            self.notifier.notify(event, self.demand_kw).await;
        }

        CycleOutcome::Confirmed {
            mode:    target,
            changed: previous != target,
        }
    }

    async fn read_meter(&mut self) -> Result<f64, ReadFailure> {
        self.demand_kw = 0.0;
        let kw = self.meter.read().await?;
        self.demand_kw = kw;
        Ok(kw)
    }

    async fn handle_read_failure(&mut self, failure: ReadFailure) -> CycleOutcome {
        match failure {
            ReadFailure::GatewayFault(kind) => {
                warn!("[Engine] Rebooting the gateway since a {} response was received.", kind);
                self.gateway.reboot().await;
                self.notifier.notify(reboot_event(kind), self.demand_kw).await;
                CycleOutcome::GatewayRebooted(kind)
            }
            other => {
                warn!("[Engine] No meter reading this cycle ({}); leaving switch {}.", other, self.mode);
                CycleOutcome::ReadSkipped
            }
        }
    }
}

#[cfg(test)]
impl<M, S, G, N> DecisionEngine<M, S, G, N> {
    pub fn parts(&self) -> (&M, &S, &G, &N) {
        (&self.meter, &self.switch, &self.gateway, &self.notifier)
    }
}

// --------------------------------------------------------------------------------------------------------------
