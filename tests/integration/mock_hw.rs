//! Recording mocks shared by the integration tests.
//!
//! [`MockIo`] stands in for the actor: it records every command written to
//! the sensor, every timer operation and every reply, and queues the
//! messages the driver posts to itself so [`Bench::pump`] can deliver them
//! in order.

use std::collections::VecDeque;

use airnode::app::ports::{ActorLink, TimerPort, UartPort};
use airnode::config::Pms7003Config;
use airnode::error::SensorError;
use airnode::sensors::pms7003::DriverState;
use airnode::sensors::pms7003::driver::{DriverMsg, MeasureReply, Pms7003Driver};
use airnode::sensors::pms7003::frame::Command;
use airnode::sensors::pms7003::receiver::FrameReceiver;
use airnode::sensors::pms7003::timers::TimerKind;

// ── Recorded calls ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoCall {
    Write(Command),
    Arm { timer: TimerKind, epoch: u32 },
    Cancel(TimerKind),
    Deliver { reader: u32, reply: MeasureReply },
    Ready,
    Resync,
}

pub struct MockIo {
    pub calls: Vec<IoCall>,
    pub posted: VecDeque<DriverMsg<u32>>,
    pub resync_pending: bool,
}

#[allow(dead_code)]
impl MockIo {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            posted: VecDeque::new(),
            resync_pending: false,
        }
    }

    /// Commands written to the sensor, in order.
    pub fn writes(&self) -> Vec<Command> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                IoCall::Write(cmd) => Some(*cmd),
                _ => None,
            })
            .collect()
    }

    /// Replies handed to waiting readers, in order.
    pub fn deliveries(&self) -> Vec<(u32, MeasureReply)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                IoCall::Deliver { reader, reply } => Some((*reader, *reply)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &IoCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl Default for MockIo {
    fn default() -> Self {
        Self::new()
    }
}

impl UartPort for MockIo {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        let cmd = Command::from_frame(bytes).ok_or(SensorError::Uart)?;
        self.calls.push(IoCall::Write(cmd));
        Ok(())
    }
}

impl TimerPort for MockIo {
    fn arm(&mut self, timer: TimerKind, epoch: u32, _delay_ms: u32) {
        self.calls.push(IoCall::Arm { timer, epoch });
    }

    fn cancel(&mut self, timer: TimerKind) {
        self.calls.push(IoCall::Cancel(timer));
    }
}

impl ActorLink<u32> for MockIo {
    fn post(&mut self, msg: DriverMsg<u32>) -> bool {
        self.posted.push_back(msg);
        true
    }

    fn deliver(&mut self, reader: u32, reply: MeasureReply) {
        self.calls.push(IoCall::Deliver { reader, reply });
    }

    fn signal_ready(&mut self) {
        self.calls.push(IoCall::Ready);
    }

    fn resync_receiver(&mut self) {
        self.calls.push(IoCall::Resync);
        self.resync_pending = true;
    }
}

// ── Bench: driver + mock + receiver ──────────────────────────

/// A driver wired to a [`MockIo`] and a real [`FrameReceiver`], recording
/// the state after every handled message.
pub struct Bench {
    pub driver: Pms7003Driver<u32>,
    pub io: MockIo,
    pub receiver: FrameReceiver,
    pub trace: Vec<DriverState>,
}

#[allow(dead_code)]
impl Bench {
    pub fn new(config: Pms7003Config) -> Self {
        Self {
            driver: Pms7003Driver::new(config),
            io: MockIo::new(),
            receiver: FrameReceiver::new(),
            trace: vec![DriverState::Uninitialized],
        }
    }

    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    /// Handle one message, then everything the driver posted to itself.
    pub fn send(&mut self, msg: DriverMsg<u32>) {
        self.handle(msg);
        self.pump();
    }

    pub fn pump(&mut self) {
        while let Some(msg) = self.io.posted.pop_front() {
            self.handle(msg);
        }
    }

    /// Feed wire bytes through the receiver, honouring resync requests the
    /// way the RX handler does.
    pub fn bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if std::mem::take(&mut self.io.resync_pending) {
                self.receiver.reset();
            }
            if let Some(frame) = self.receiver.push(b) {
                self.send(DriverMsg::Frame(frame));
            }
        }
    }

    /// Fire `timer` with its current epoch.
    pub fn fire(&mut self, timer: TimerKind) {
        let epoch = self.driver.timers().epoch(timer);
        self.send(DriverMsg::TimerFired { timer, epoch });
    }

    fn handle(&mut self, msg: DriverMsg<u32>) {
        self.driver.handle(msg, &mut self.io);
        let state = self.driver.state();
        if self.trace.last() != Some(&state) {
            self.trace.push(state);
        }
    }
}
