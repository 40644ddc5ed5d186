//! System configuration parameters
//!
//! All tunable parameters for the AirNode endpoint. The firmware boots with
//! [`SystemConfig::default`]; a JSON document (provisioning or NVS blob) can
//! override it through [`SystemConfig::from_json`].

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// PMS7003 driver timing and mode parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pms7003Config {
    /// Put the sensor to sleep between measurements.
    pub use_sleep_mode: bool,
    /// No-response watchdog armed after every outbound command (ms).
    pub response_timeout_ms: u32,
    /// Fan spin-up delay after passive mode is confirmed (ms).
    pub warmup_ms: u32,
    /// Minimum gap between two consecutive read commands (ms).
    pub read_cooldown_ms: u32,
    /// Idle time in `read_ready` before the sensor is put back to sleep (ms).
    pub auto_sleep_ms: u32,
    /// How long `init()` waits for the first data frame (ms).
    pub init_timeout_ms: u32,
    /// UART line speed.
    pub baud_rate: u32,
}

impl Default for Pms7003Config {
    fn default() -> Self {
        Self {
            use_sleep_mode: true,
            response_timeout_ms: 5000,
            warmup_ms: 30_000,
            read_cooldown_ms: 100,
            auto_sleep_ms: 5000,
            init_timeout_ms: 5000,
            baud_rate: 9600,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Particulate sensor ---
    pub pms7003: Pms7003Config,

    // --- Application loop ---
    /// Interval between two measurements in the main loop (seconds)
    pub measure_interval_secs: u32,
    /// Emit the delimited record after every measurement
    pub csv_output: bool,
    /// Pulse the sensor reset line before `init()`
    pub reset_on_boot: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pms7003: Pms7003Config::default(),
            measure_interval_secs: 60, // 1/min
            csv_output: true,
            reset_on_boot: true,
        }
    }
}

impl SystemConfig {
    /// Reject combinations the driver cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        let p = &self.pms7003;
        if p.response_timeout_ms == 0 {
            return Err(Error::Config("response timeout is zero"));
        }
        if p.init_timeout_ms == 0 {
            return Err(Error::Config("init timeout is zero"));
        }
        if p.warmup_ms == 0 {
            return Err(Error::Config("warm-up is zero"));
        }
        if p.read_cooldown_ms == 0 {
            return Err(Error::Config("read cooldown is zero"));
        }
        if p.auto_sleep_ms == 0 {
            return Err(Error::Config("auto-sleep delay is zero"));
        }
        if p.auto_sleep_ms <= p.read_cooldown_ms {
            return Err(Error::Config("auto-sleep not longer than read cooldown"));
        }
        if p.baud_rate == 0 {
            return Err(Error::Config("baud rate is zero"));
        }
        if p.warmup_ms < p.read_cooldown_ms {
            return Err(Error::Config("warm-up shorter than read cooldown"));
        }
        if self.measure_interval_secs == 0 {
            return Err(Error::Config("measure interval is zero"));
        }
        Ok(())
    }

    /// Parse a JSON document and validate the result. Missing keys keep
    /// their default values.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
