use crate::configuration::config::Config;
use crate::error::GatewayFaultKind;
use crate::models::charger_models::{ChargerEvent, ChargerMode};

// --------------------------------------------------------------------------------------------------------------

/// Low-cost utility tier in local wall-clock hours, half-open `[start, end)`.
/// `start > end` wraps midnight; `start == end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueWindow {
    pub start_hour: u32,
    pub end_hour:   u32,
}

impl ValueWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Everything the decision needs besides the mode, the reading and the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub window:       ValueWindow,
    /// kW the load adds to the meter once it is running.
    pub load_kw:      f64,
    pub threshold_kw: f64,
}

impl Policy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: ValueWindow {
                start_hour: config.value_window.start_hour,
                end_hour:   config.value_window.end_hour,
            },
            load_kw:      config.load_current_kw,
            threshold_kw: config.switching_threshold_kw,
        }
    }

    pub fn in_value_window(&self, hour: u32) -> bool {
        self.window.contains(hour)
    }

    /// Target mode outside the value window.
    ///
    /// While on, the load's own draw is already in the reading, so the raw demand is compared.
    /// While off, the load's draw must still fit under the threshold. Comparisons are inclusive.
    /// Leaving the value window always switches off first.
    pub fn peak_target(&self, current: ChargerMode, demand_kw: f64) -> ChargerMode {
        let surplus = match current {
            ChargerMode::On                        => demand_kw <= self.threshold_kw,
            ChargerMode::Off | ChargerMode::Startup => demand_kw + self.load_kw <= self.threshold_kw,
            ChargerMode::OnValueWindow             => false,
        };
        if surplus {
            ChargerMode::On
        } else {
            ChargerMode::Off
        }
    }
}

// --------------------------------------------------------------------------------------------------------------

/// Notification for a confirmed actuation, `None` when nothing changed that anyone cares about.
pub fn transition_event(previous: ChargerMode, next: ChargerMode) -> Option<ChargerEvent> {
    match (previous, next) {
        (ChargerMode::OnValueWindow, ChargerMode::OnValueWindow) => None,
        (_, ChargerMode::OnValueWindow)                          => Some(ChargerEvent::OnValueWindow),
        (ChargerMode::On, ChargerMode::On)                       => None,
        (_, ChargerMode::On)                                     => Some(ChargerEvent::On),
        (ChargerMode::OnValueWindow, ChargerMode::Off)           => Some(ChargerEvent::OffValue),
        (ChargerMode::On, ChargerMode::Off)                      => Some(ChargerEvent::OffCurrent),
        (_, ChargerMode::Off)                                    => None,
        (_, ChargerMode::Startup)                                => None,
    }
}

/// Notification for a failed attempt to reach `target`.
pub fn failure_event(target: ChargerMode) -> ChargerEvent {
    match target {
        ChargerMode::OnValueWindow                  => ChargerEvent::OnValueWindowError,
        ChargerMode::On                             => ChargerEvent::OnError,
        ChargerMode::Off | ChargerMode::Startup     => ChargerEvent::OffError,
    }
}

pub fn reboot_event(kind: GatewayFaultKind) -> ChargerEvent {
    match kind {
        GatewayFaultKind::RequestTimeout     => ChargerEvent::RebootGatewayTimeout,
        GatewayFaultKind::ServiceUnavailable => ChargerEvent::RebootGatewayUnavailable,
    }
}

// --------------------------------------------------------------------------------------------------------------
