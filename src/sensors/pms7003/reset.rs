//! Hardware reset of the sensor through its RESET line.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::info;

use crate::error::SensorError;

/// Width of each phase of the reset pulse.
pub const RESET_PHASE_MS: u32 = 10;

/// Pulse the reset line: low, high, low, holding each level 10 ms.
pub fn pulse_reset<P, D>(pin: &mut P, delay: &mut D) -> Result<(), SensorError>
where
    P: OutputPin,
    D: DelayNs,
{
    info!("pms7003: pulsing reset line");
    pin.set_low().map_err(|_| SensorError::ResetFailed)?;
    delay.delay_ms(RESET_PHASE_MS);
    pin.set_high().map_err(|_| SensorError::ResetFailed)?;
    delay.delay_ms(RESET_PHASE_MS);
    pin.set_low().map_err(|_| SensorError::ResetFailed)
}
