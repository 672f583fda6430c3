use async_trait::async_trait;

use crate::error::{ActuationFailure, ReadFailure};
use crate::models::charger_models::ChargerEvent;

pub mod controller;
pub mod policy;

#[cfg(test)]
pub mod testing;

// --------------------------------------------------------------------------------------------------------------
// Collaborators of the decision engine. Every call is awaited to completion before the next one starts.

/// Instantaneous demand in kW (positive = importing, negative = exporting).
#[async_trait]
pub trait DemandSource: Send + Sync {
    async fn read(&self) -> Result<f64, ReadFailure>;
}

/// The relay the load is plugged into. Returns the state the relay confirmed.
#[async_trait]
pub trait ChargerSwitch: Send + Sync {
    async fn set_state(&self, on: bool) -> Result<bool, ActuationFailure>;
}

/// Power control for the metering gateway. Failures are logged by the implementation, never returned.
#[async_trait]
pub trait GatewayPower: Send + Sync {
    async fn power_on(&self) -> bool;
    async fn reboot(&self);
}

/// Fire-and-forget event delivery.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, event: ChargerEvent, demand_kw: f64);
}
