//! AirNode Firmware: Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  main task: boot → config → reset pulse → UART → init        │
//! │             then measure / log every `measure_interval_secs` │
//! │                                                              │
//! │  pms-uart-rx ──bytes──▶ RxHandler ──frames──▶ ┌──────────┐   │
//! │  pms-timer ──────────────fires──────────────▶ │ pms-actor│   │
//! │  main task ──────────init / measure─────────▶ └──────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The radio join, uplink encoding and system watchdog live outside this
//! binary; it produces the human-readable and delimited measurement
//! records they consume.
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use log::{debug, info, warn};

use airnode::adapters::nvs::NvsConfigStore;
use airnode::adapters::time::MonotonicClock;
use airnode::adapters::uart;
use airnode::app::ports::ConfigPort;
use airnode::config::SystemConfig;
use airnode::sensors::pms7003::{CSV_HEADER, Pms7003, reset};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AirNode v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsConfigStore::new() {
        Ok(nvs) => nvs.load().unwrap_or_else(|e| {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            SystemConfig::default()
        }
    };
    config.validate()?;

    let peripherals = Peripherals::take()?;

    // ── 3. Sensor reset line (GPIO4) ──────────────────────────
    // Held for the lifetime of the firmware so the line keeps its level.
    let mut reset_pin = PinDriver::output(peripherals.pins.gpio4)?;
    if config.reset_on_boot {
        if let Err(e) = reset::pulse_reset(&mut reset_pin, &mut Ets) {
            warn!("PMS7003 reset failed: {}", e);
        }
    }

    // ── 4. Sensor UART (UART1, TX=GPIO17, RX=GPIO18) ──────────
    let (tx, rx) = uart::open(
        peripherals.uart1,
        peripherals.pins.gpio17,
        peripherals.pins.gpio18,
        config.pms7003.baud_rate,
    )?;
    let sensor = Pms7003::new(tx, config.pms7003.clone());
    let _rx_pump = uart::spawn_rx_pump(rx, sensor.rx_handler())?;

    // ── 5. Driver handshake ───────────────────────────────────
    match sensor.init(config.pms7003.use_sleep_mode) {
        Ok(()) => info!("PMS7003 ready"),
        Err(e) => warn!("PMS7003 {}, continuing degraded while the driver retries", e),
    }

    // ── 6. Measurement loop ───────────────────────────────────
    let clock = MonotonicClock::new();
    if config.csv_output {
        info!("{}", CSV_HEADER);
    }
    let interval = Duration::from_secs(u64::from(config.measure_interval_secs));

    loop {
        match sensor.measure() {
            Ok(m) => {
                info!("{}", m);
                if config.csv_output {
                    info!("{}", m.csv(clock.uptime_ms()));
                }
            }
            Err(e) => warn!("PMS7003 measure failed: {}", e),
        }

        let stats = sensor.stats();
        debug!(
            "PMS7003 state={} pending={} recoveries={}",
            stats.state.name(),
            stats.pending_readers,
            stats.recoveries
        );

        std::thread::sleep(interval);
    }
}
