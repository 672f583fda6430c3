use std::fmt;

// --------------------------------------------------------------------------------------------------------------

/// The controller's persistent state, held between cycles.
/// Always reflects the last switch command the hub confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerMode {
    /// Before the first confirmed actuation. Collapsed into `Off` by the startup sequence.
    Startup,
    Off,
    /// On because there is enough solar surplus.
    On,
    /// On because we are inside the low-cost utility window.
    OnValueWindow,
}

impl ChargerMode {
    pub fn is_on(&self) -> bool {
        matches!(self, ChargerMode::On | ChargerMode::OnValueWindow)
    }
}

impl fmt::Display for ChargerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChargerMode::Startup       => "startup",
            ChargerMode::Off           => "off",
            ChargerMode::On            => "on (solar)",
            ChargerMode::OnValueWindow => "on (value window)",
        };
        f.write_str(s)
    }
}

// --------------------------------------------------------------------------------------------------------------

/// Everything that produces a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerEvent {
    /// Switched on: solar surplus covers the load.
    On,
    /// Switched off: demand rose above the threshold.
    OffCurrent,
    /// Switched off: the value window ended.
    OffValue,
    /// Switched off and gateway powered at process start.
    OffStartup,
    OnError,
    OffError,
    /// Switched on: the value window started.
    OnValueWindow,
    OnValueWindowError,
    RebootGatewayTimeout,
    RebootGatewayUnavailable,
}

impl ChargerEvent {
    /// Reboot and startup messages carry no meaningful meter reading.
    pub fn includes_reading(&self) -> bool {
        !matches!(
            self,
            ChargerEvent::OffStartup
                | ChargerEvent::RebootGatewayTimeout
                | ChargerEvent::RebootGatewayUnavailable
        )
    }
}
