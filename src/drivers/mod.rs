//! Low-level runtime helpers shared by the sensor drivers.

pub mod task_pin;
