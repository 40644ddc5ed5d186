//! Application core boundary.
//!
//! The PMS7003 state machine is pure domain logic with zero I/O. All
//! interaction with the UART, the timer service and the actor mailbox
//! happens through the **port traits** defined in [`ports`], keeping the
//! driver fully testable without real peripherals.

pub mod ports;
