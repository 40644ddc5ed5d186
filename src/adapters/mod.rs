//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter | Implements | Connects to                      |
//! |---------|------------|----------------------------------|
//! | `nvs`   | ConfigPort | NVS flash / in-memory store      |
//! | `time`  | -          | ESP32 high-resolution timer      |
//! | `uart`  | UartPort   | ESP-IDF UART driver (target only)|

pub mod nvs;
pub mod time;
#[cfg(target_os = "espidf")]
pub mod uart;
