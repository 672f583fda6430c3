use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::insteon_models::Outlet;

// --------------------------------------------------------------------------------------------------------------

const DEFAULT_CONFIG_FILE: &str = "config.json";
const CONFIG_PATH_ENV:     &str = "EV_CHARGER_CONFIG";

// --------------------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Seconds between two decision cycles.
    pub poll_interval_seconds: u64,

    // --- decision policy ---

    /// Low-cost utility tier, local wall-clock hours, half-open [start, end).
    pub value_window: ValueWindowConfig,
    /// Kilowatts the load draws once switched on (EV charger: ~1.4 kW on 120 V).
    pub load_current_kw: f64,
    /// Demand (kW) at or below which there is enough solar surplus to run the load.
    pub switching_threshold_kw: f64,

    // --- devices ---

    pub meter:   MeterConfig,
    pub hub:     HubConfig,
    pub charger: ChargerConfig,
    pub gateway: GatewayConfig,
    pub mail:    MailConfig,
    pub startup: StartupConfig,

    // --- logging ---

    /// Log level: "Trace", "Debug", "Info", "Warn", "Error"
    pub log_level: String,
}

/// Hours of the low-cost tier, `[start_hour, end_hour)`. A window with `start_hour > end_hour` wraps midnight.
/// Equal hours disable the window: the charger then only runs on solar surplus.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct ValueWindowConfig {
    pub start_hour: u32,
    pub end_hour:   u32,
}

/// How the gateway encodes the demand value.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DemandEncoding {
    /// `0x`-prefixed raw value plus Multiplier/Divisor fields.
    Hex,
    /// Already-scaled signed decimal kW.
    Decimal,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MeterConfig {
    /// Rainforest cloud post manager, e.g. "https://rainforestcloud.com:9445/cgi-bin/post_manager"
    pub url:      String,
    pub cloud_id: String,
    pub user:     String,
    pub password: String,
    /// Meter MAC address. Discovered through `list_devices` at startup when absent.
    pub mac_id:   Option<String>,
    pub encoding: DemandEncoding,
    /// Also read the meter during the value window (logging only).
    pub read_in_value_window: bool,
    pub connect_timeout_seconds: u64,
    pub timeout_seconds:         u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HubConfig {
    /// Insteon hub base URL, e.g. "http://192.168.1.35:25105"
    pub url:      String,
    pub username: String,
    pub password: String,
    pub connect_timeout_seconds: u64,
    pub timeout_seconds:         u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ChargerConfig {
    /// Insteon id of the on/off outlet the charger is plugged into.
    pub device_id: String,
    pub outlet:    Outlet,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Insteon id of the relay that powers the Eagle gateway.
    pub device_id:          String,
    pub off_delay_seconds:  u64,
    /// Time the gateway needs to boot after power is restored.
    pub boot_delay_seconds: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MailConfig {
    pub enabled:    bool,
    pub smtp_host:  String,
    /// 465 = implicit TLS (smtps).
    pub smtp_port:  u16,
    pub username:   String,
    pub password:   String,
    pub from:       String,
    /// Email and/or SMS gateway addresses, e.g. "1234567890@vtext.com".
    pub recipients: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct StartupConfig {
    pub switch_attempts:         u32,
    pub initial_backoff_seconds: u64,
}

// --------------------------------------------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_seconds:  120,
            value_window:           ValueWindowConfig::default(),
            load_current_kw:        1.4,
            switching_threshold_kw: 0.0,
            meter:                  MeterConfig::default(),
            hub:                    HubConfig::default(),
            charger:                ChargerConfig::default(),
            gateway:                GatewayConfig::default(),
            mail:                   MailConfig::default(),
            startup:                StartupConfig::default(),
            log_level:              "Info".to_string(),
        }
    }
}

impl Default for ValueWindowConfig {
    fn default() -> Self {
        // PG&E off-peak tier
        Self { start_hour: 23, end_hour: 7 }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            url:                     "https://rainforestcloud.com:9445/cgi-bin/post_manager".to_string(),
            cloud_id:                String::new(),
            user:                    String::new(),
            password:                String::new(),
            mac_id:                  None,
            encoding:                DemandEncoding::Hex,
            read_in_value_window:    true,
            connect_timeout_seconds: 10,
            timeout_seconds:         30,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url:                     "http://127.0.0.1:25105".to_string(),
            username:                String::new(),
            password:                String::new(),
            connect_timeout_seconds: 5,
            timeout_seconds:         15,
        }
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            device_id: "418C4B".to_string(),
            outlet:    Outlet::Bottom,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            device_id:          "376524".to_string(),
            off_delay_seconds:  5,
            boot_delay_seconds: 60,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled:    false,
            smtp_host:  "smtp.gmail.com".to_string(),
            smtp_port:  465,
            username:   String::new(),
            password:   String::new(),
            from:       String::new(),
            recipients: Vec::new(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            switch_attempts:         5,
            initial_backoff_seconds: 5,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid("poll_interval_seconds must be > 0".to_string()));
        }
        let window = &self.value_window;
        if window.start_hour > 23 || window.end_hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "value_window hours must be 0..=23 (got {}..{})",
                window.start_hour, window.end_hour
            )));
        }
        if !self.load_current_kw.is_finite() || !self.switching_threshold_kw.is_finite() {
            return Err(ConfigError::Invalid(
                "load_current_kw and switching_threshold_kw must be finite".to_string(),
            ));
        }
        if self.mail.enabled && self.mail.recipients.is_empty() {
            return Err(ConfigError::Invalid("mail is enabled but has no recipients".to_string()));
        }
        if self.startup.switch_attempts == 0 {
            return Err(ConfigError::Invalid("startup.switch_attempts must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn from_json(json: &str, path: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

// --------------------------------------------------------------------------------------------------------------

/// Load `config.json` (or the file named by `EV_CHARGER_CONFIG`).
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let config_data = fs::read_to_string(&config_file).map_err(|source| ConfigError::Read {
        path: config_file.clone(),
        source,
    })?;
    Config::from_json(&config_data, &config_file)
}

// --------------------------------------------------------------------------------------------------------------
