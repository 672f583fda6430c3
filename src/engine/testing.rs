//! In-memory collaborators that record every call.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChargerSwitch, DemandSource, GatewayPower, Notify};
use crate::error::{ActuationFailure, ReadFailure};
use crate::models::charger_models::ChargerEvent;

#[derive(Default)]
pub struct FakeMeter {
    readings: Mutex<VecDeque<Result<f64, ReadFailure>>>,
    reads:    AtomicUsize,
}

impl FakeMeter {
    pub fn new(readings: Vec<Result<f64, ReadFailure>>) -> Self {
        Self {
            readings: Mutex::new(readings.into()),
            reads:    AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DemandSource for FakeMeter {
    async fn read(&self) -> Result<f64, ReadFailure> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ReadFailure::Transport("no scripted reading".to_string())))
    }
}

/// Succeeds unless a failure was queued for the next command.
#[derive(Default)]
pub struct FakeSwitch {
    failures: Mutex<VecDeque<bool>>,
    commands: Mutex<Vec<bool>>,
}

impl FakeSwitch {
    /// `true` entries make the matching command fail.
    pub fn failing(pattern: Vec<bool>) -> Self {
        Self {
            failures: Mutex::new(pattern.into()),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<bool> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChargerSwitch for FakeSwitch {
    async fn set_state(&self, on: bool) -> Result<bool, ActuationFailure> {
        self.commands.lock().unwrap().push(on);
        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            Err(ActuationFailure::Transport("hub unreachable".to_string()))
        } else {
            Ok(on)
        }
    }
}

#[derive(Default)]
pub struct FakeGateway {
    power_ons: AtomicUsize,
    reboots:   AtomicUsize,
}

impl FakeGateway {
    pub fn power_ons(&self) -> usize {
        self.power_ons.load(Ordering::SeqCst)
    }

    pub fn reboots(&self) -> usize {
        self.reboots.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayPower for FakeGateway {
    async fn power_on(&self) -> bool {
        self.power_ons.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn reboot(&self) {
        self.reboots.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(ChargerEvent, f64)>>,
}

impl FakeNotifier {
    pub fn events(&self) -> Vec<ChargerEvent> {
        self.sent.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    pub fn sent(&self) -> Vec<(ChargerEvent, f64)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notify for FakeNotifier {
    async fn notify(&self, event: ChargerEvent, demand_kw: f64) {
        self.sent.lock().unwrap().push((event, demand_kw));
    }
}
