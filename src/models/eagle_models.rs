use serde::Deserialize;

use crate::configuration::config::DemandEncoding;

// --------------------------------------------------------------------------------------------------------------
// Rainforest EAGLE REST API (cloud post manager)
//
// Request:  POST <url>, Content-Type: text/xml, headers Cloud-Id / User / Password
//           Body: <Command><Name>get_instantaneous_demand</Name><MacId>0x...</MacId></Command>
//
// Response: <InstantaneousDemand>
//             <DeviceMacId>0x00158d0000000004</DeviceMacId>
//             <Demand>0x001738</Demand>
//             <Multiplier>0x00000001</Multiplier>
//             <Divisor>0x000003e8</Divisor>
//             ...
//           </InstantaneousDemand>
//
//           demand = 0x1738 * 1 / 0x3e8 = 5.944 kW
// --------------------------------------------------------------------------------------------------------------

/// Largest value of the meter's 32-bit demand register.
const DEMAND_REGISTER_MAX: f64 = 0xFFFF_FFFF_u32 as f64;

pub const LIST_DEVICES_COMMAND: &str = "<Command>\r\n<Name>list_devices</Name>\r\n</Command>\r\n";

pub fn instantaneous_demand_command(mac_id: &str) -> String {
    format!(
        "<Command>\r\n<Name>get_instantaneous_demand</Name>\r\n<MacId>{}</MacId>\r\n</Command>\r\n",
        mac_id
    )
}

// --------------------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InstantaneousDemand {
    #[serde(rename = "Demand")]
    pub demand: String,
    #[serde(rename = "Multiplier", default)]
    pub multiplier: Option<String>,
    #[serde(rename = "Divisor", default)]
    pub divisor: Option<String>,
}

impl InstantaneousDemand {
    pub fn from_xml(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml.trim())
    }

    /// Demand in kW, scaled and sign-corrected according to the gateway's encoding.
    pub fn demand_kw(&self, encoding: DemandEncoding) -> Result<f64, String> {
        match encoding {
            DemandEncoding::Decimal => self
                .demand
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("Demand '{}' is not a decimal: {}", self.demand, e)),
            DemandEncoding::Hex => {
                let raw        = signed_demand(&self.demand)?;
                let multiplier = scale_factor(self.multiplier.as_deref())?;
                let divisor    = scale_factor(self.divisor.as_deref())?;
                Ok(raw * multiplier / divisor)
            }
        }
    }
}

/// Parse a `0x`-prefixed hex field.
fn parse_hex(field: &str) -> Result<u64, String> {
    let trimmed = field.trim();
    let digits  = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|e| format!("'{}' is not hex: {}", field, e))
}

/// Exported power shows up as a register full of leading f's; fold it back below zero.
fn signed_demand(field: &str) -> Result<f64, String> {
    let raw = parse_hex(field)? as f64;
    let exporting = field
        .trim()
        .chars()
        .nth(2)
        .is_some_and(|c| c.eq_ignore_ascii_case(&'f'));
    if exporting {
        Ok((DEMAND_REGISTER_MAX - raw) * -1.0)
    } else {
        Ok(raw)
    }
}

/// Multiplier/divisor; zero or absent means 1.
fn scale_factor(field: Option<&str>) -> Result<f64, String> {
    match field {
        None => Ok(1.0),
        Some(f) => match parse_hex(f)? {
            0 => Ok(1.0),
            v => Ok(v as f64),
        },
    }
}

// --------------------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct DeviceList {
    #[serde(rename = "DeviceInfo", default)]
    pub devices: Vec<DeviceInfo>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeviceInfo {
    #[serde(rename = "DeviceMacId")]
    pub device_mac_id: String,
}

impl DeviceList {
    pub fn from_xml(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml.trim())
    }

    pub fn first_mac_id(&self) -> Option<&str> {
        self.devices
            .iter()
            .map(|d| d.device_mac_id.trim())
            .find(|mac| !mac.is_empty())
    }
}

// --------------------------------------------------------------------------------------------------------------
