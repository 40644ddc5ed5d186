//! Sensor drivers.

pub mod pms7003;
