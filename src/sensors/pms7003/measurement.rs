//! Decoded PMS7003 measurement and its two text renderings.
//!
//! The human-readable form is a multi-line block for the console log. The
//! delimited form is a single `;`-separated record prefixed with the uptime
//! timestamp, consumed by telemetry.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Number of big-endian `u16` fields carried by a data frame.
pub const FIELD_COUNT: usize = 12;

/// Column names of the delimited record, in field order.
pub const CSV_HEADER: &str = "timestamp_ms;pm1_0_std;pm2_5_std;pm10_std;pm1_0_atm;pm2_5_atm;\
pm10_atm;n0_3um;n0_5um;n1_0um;n2_5um;n5_0um;n10um";

/// One delimited record. 12 fields of at most 5 digits plus a 20 digit
/// timestamp always fit.
pub type CsvRecord = heapless::String<128>;

/// Concentrations are in µg/m³, particle counts per 0.1 L of air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub pm1_0_standard: u16,
    pub pm2_5_standard: u16,
    pub pm10_standard: u16,
    pub pm1_0_atmospheric: u16,
    pub pm2_5_atmospheric: u16,
    pub pm10_atmospheric: u16,
    pub particles_0_3um: u16,
    pub particles_0_5um: u16,
    pub particles_1_0um: u16,
    pub particles_2_5um: u16,
    pub particles_5_0um: u16,
    pub particles_10um: u16,
}

impl Measurement {
    /// Build from fields in wire order.
    pub const fn from_fields(f: [u16; FIELD_COUNT]) -> Self {
        Self {
            pm1_0_standard: f[0],
            pm2_5_standard: f[1],
            pm10_standard: f[2],
            pm1_0_atmospheric: f[3],
            pm2_5_atmospheric: f[4],
            pm10_atmospheric: f[5],
            particles_0_3um: f[6],
            particles_0_5um: f[7],
            particles_1_0um: f[8],
            particles_2_5um: f[9],
            particles_5_0um: f[10],
            particles_10um: f[11],
        }
    }

    /// Fields in wire order.
    pub const fn fields(&self) -> [u16; FIELD_COUNT] {
        [
            self.pm1_0_standard,
            self.pm2_5_standard,
            self.pm10_standard,
            self.pm1_0_atmospheric,
            self.pm2_5_atmospheric,
            self.pm10_atmospheric,
            self.particles_0_3um,
            self.particles_0_5um,
            self.particles_1_0um,
            self.particles_2_5um,
            self.particles_5_0um,
            self.particles_10um,
        ]
    }

    /// Render the delimited record `timestamp;f1;...;f12`.
    pub fn csv(&self, timestamp_ms: u64) -> CsvRecord {
        use core::fmt::Write;

        let mut out = CsvRecord::new();
        // Capacity covers the widest possible record.
        let _ = write!(out, "{timestamp_ms}");
        for v in self.fields() {
            let _ = write!(out, ";{v}");
        }
        out
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PMS7003 measurement:")?;
        writeln!(
            f,
            "  standard    PM1.0={:>5} PM2.5={:>5} PM10={:>5} ug/m3",
            self.pm1_0_standard, self.pm2_5_standard, self.pm10_standard
        )?;
        writeln!(
            f,
            "  atmospheric PM1.0={:>5} PM2.5={:>5} PM10={:>5} ug/m3",
            self.pm1_0_atmospheric, self.pm2_5_atmospheric, self.pm10_atmospheric
        )?;
        writeln!(
            f,
            "  >0.3um={} >0.5um={} >1.0um={} per 0.1L",
            self.particles_0_3um, self.particles_0_5um, self.particles_1_0um
        )?;
        write!(
            f,
            "  >2.5um={} >5.0um={} >10um={} per 0.1L",
            self.particles_2_5um, self.particles_5_0um, self.particles_10um
        )
    }
}
