//! Plantower PMS7003 particulate-matter sensor driver.
//!
//! | Module        | Role                                                  |
//! |---------------|-------------------------------------------------------|
//! | `frame`       | wire format: commands, acknowledgments, data frames   |
//! | `measurement` | decoded record, human-readable and delimited output   |
//! | `receiver`    | per-byte frame accumulator (UART receive context)     |
//! | `queue`       | bounded FIFO of callers waiting for a measurement     |
//! | `timers`      | the four one-shot timeouts and their service thread   |
//! | `driver`      | protocol state machine                                |
//! | `actor`       | mailbox runtime and the blocking `init`/`measure` API |
//! | `reset`       | hardware reset pulse                                  |

pub mod actor;
pub mod driver;
pub mod frame;
pub mod measurement;
pub mod queue;
pub mod receiver;
pub mod reset;
pub mod timers;

pub use actor::{Pms7003, RxHandler};
pub use driver::{DriverState, DriverStats};
pub use measurement::{CSV_HEADER, Measurement};
