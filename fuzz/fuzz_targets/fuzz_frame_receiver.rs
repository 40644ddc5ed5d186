//! Fuzz target: `FrameReceiver::push`
//!
//! Drives arbitrary byte sequences through the PMS7003 frame receiver and
//! asserts that it never panics, never lets the cursor reach a full data
//! frame, and only reports data frames whose checksum holds.
//!
//! cargo fuzz run fuzz_frame_receiver

#![no_main]

use airnode::sensors::pms7003::frame::{DATA_FRAME_LEN, encode_data_frame};
use airnode::sensors::pms7003::receiver::{FrameReceiver, RxFrame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut receiver = FrameReceiver::new();

    for &b in data {
        if let Some(RxFrame::Data(m)) = receiver.push(b) {
            // Re-encoding must give a frame that decodes to the same fields.
            let again = encode_data_frame(&m);
            let mut check = FrameReceiver::new();
            let out = again.iter().filter_map(|b| check.push(*b)).last();
            assert_eq!(out, Some(RxFrame::Data(m)));
        }
        assert!(receiver.cursor() < DATA_FRAME_LEN, "cursor overran the frame buffer");
    }

    // After a reset the receiver must accept bytes cleanly again.
    receiver.reset();
    assert_eq!(receiver.cursor(), 0);
    for &b in data {
        let _ = receiver.push(b);
    }
});
