use serde::Deserialize;

// --------------------------------------------------------------------------------------------------------------
// Insteon Hub local HTTP API
//
// Direct command:  GET /3?0262<device id><flags><cmd1><cmd2>=I=3
//                  e.g. /3?0262418C4B0F3202=I=3  (outlet 418C4B, bottom plug on)
// Authentication:  HTTP basic auth with the hub's username/password.
// --------------------------------------------------------------------------------------------------------------

const SEND_STANDARD_MESSAGE: &str = "0262";
const STANDARD_FLAGS: u8 = 0x0F;

const CMD_OUTLET_ON:     u8 = 0x32;
const CMD_OUTLET_OFF:    u8 = 0x33;
const CMD_RELAY_FAST_ON:  u8 = 0x12;
const CMD_RELAY_FAST_OFF: u8 = 0x14;

/// The two plugs of an on/off outlet module.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outlet {
    Top,
    Bottom,
}

impl Outlet {
    fn selector(&self) -> u8 {
        match self {
            Outlet::Top    => 0x01,
            Outlet::Bottom => 0x02,
        }
    }
}

/// A single standard-length Insteon direct command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsteonCommand {
    pub device_id: String,
    pub flags:     u8,
    pub cmd1:      u8,
    pub cmd2:      u8,
}

impl InsteonCommand {
    pub fn outlet(device_id: &str, outlet: Outlet, on: bool) -> Self {
        Self {
            device_id: device_id.to_uppercase(),
            flags:     STANDARD_FLAGS,
            cmd1:      if on { CMD_OUTLET_ON } else { CMD_OUTLET_OFF },
            cmd2:      outlet.selector(),
        }
    }

    /// Whole-device relay (used for the gateway's power switch).
    pub fn relay(device_id: &str, on: bool) -> Self {
        Self {
            device_id: device_id.to_uppercase(),
            flags:     STANDARD_FLAGS,
            cmd1:      if on { CMD_RELAY_FAST_ON } else { CMD_RELAY_FAST_OFF },
            cmd2:      if on { 0xFF } else { 0x00 },
        }
    }

    /// Path and query for the hub, e.g. "/3?0262418C4B0F3202=I=3".
    pub fn to_path(&self) -> String {
        format!(
            "/3?{}{}{:02X}{:02X}{:02X}=I=3",
            SEND_STANDARD_MESSAGE, self.device_id, self.flags, self.cmd1, self.cmd2
        )
    }
}

// --------------------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_outlet_commands_match_hub_urls() {
        assert_eq!(
            InsteonCommand::outlet("418C4B", Outlet::Bottom, true).to_path(),
            "/3?0262418C4B0F3202=I=3"
        );
        assert_eq!(
            InsteonCommand::outlet("418C4B", Outlet::Bottom, false).to_path(),
            "/3?0262418C4B0F3302=I=3"
        );
    }

    #[test]
    fn top_outlet_uses_selector_one() {
        assert_eq!(
            InsteonCommand::outlet("418c4b", Outlet::Top, true).to_path(),
            "/3?0262418C4B0F3201=I=3"
        );
    }

    #[test]
    fn relay_commands_match_gateway_urls() {
        assert_eq!(InsteonCommand::relay("376524", true).to_path(), "/3?02623765240F12FF=I=3");
        assert_eq!(InsteonCommand::relay("376524", false).to_path(), "/3?02623765240F1400=I=3");
    }
}
