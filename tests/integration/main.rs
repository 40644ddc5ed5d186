//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the PMS7003 driver
//! against mock adapters. All tests run on the host (x86_64) with no
//! real hardware required.

mod driver_flow_tests;
mod handle_tests;
mod mock_hw;
