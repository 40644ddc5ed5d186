//! PMS7003 protocol state machine.
//!
//! ```text
//!  uninitialized ──init──▶ initializing ──data──┬─▶ sleeping_unconfirmed ──ack──▶ sleeping
//!                              ▲                │                                   │ reader
//!                              │                └─▶ passive_unconfirmed ◀──data── exiting_sleep
//!                              │                        │ ack
//!                     recovery │                        ▼
//!            (watchdog, bad    │                     passive ──warm-up──▶ read_ready ◀─────┐
//!             frame, invalid   │                                   │ auto-sleep │ read     │ cooldown
//!             event)           │                 sleeping_unconfirmed ◀──┘      ▼          │
//!                              └──────────────────────────────────────── read_asked ──▶ cooldown
//! ```
//!
//! [`Pms7003Driver`] owns all protocol state: the current state, the
//! pending-reader queue and the timer epochs. It is driven one message at
//! a time by the actor thread and talks to the outside world only through
//! the port traits in [`crate::app::ports`].

use log::{debug, info, warn};

use crate::app::ports::{ActorLink, TimerPort, UartPort};
use crate::config::Pms7003Config;
use crate::error::SensorError;

use super::frame::Command;
use super::measurement::Measurement;
use super::queue::{QueueFull, READER_QUEUE_CAPACITY, ReaderQueue};
use super::receiver::RxFrame;
use super::timers::{TimerKind, TimerSet};

/// What a waiting caller eventually receives.
pub type MeasureReply = Result<Measurement, SensorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverState {
    Uninitialized = 0,
    Initializing = 1,
    SleepingUnconfirmed = 2,
    Sleeping = 3,
    PassiveUnconfirmed = 4,
    ExitingSleep = 5,
    Passive = 6,
    ReadReady = 7,
    ReadAsked = 8,
    Cooldown = 9,
}

impl DriverState {
    pub const COUNT: usize = 10;

    /// Inverse of `state as u8`. Out-of-range values map to `Uninitialized`.
    pub fn from_index(idx: u8) -> Self {
        match idx {
            1 => Self::Initializing,
            2 => Self::SleepingUnconfirmed,
            3 => Self::Sleeping,
            4 => Self::PassiveUnconfirmed,
            5 => Self::ExitingSleep,
            6 => Self::Passive,
            7 => Self::ReadReady,
            8 => Self::ReadAsked,
            9 => Self::Cooldown,
            _ => Self::Uninitialized,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::SleepingUnconfirmed => "sleeping_unconfirmed",
            Self::Sleeping => "sleeping",
            Self::PassiveUnconfirmed => "passive_unconfirmed",
            Self::ExitingSleep => "exiting_sleep",
            Self::Passive => "passive",
            Self::ReadReady => "read_ready",
            Self::ReadAsked => "read_asked",
            Self::Cooldown => "cooldown",
        }
    }
}

/// Mailbox message. `R` identifies a caller waiting in `measure()`.
#[derive(Debug, Clone)]
pub enum DriverMsg<R> {
    /// `init()` was called.
    Init { use_sleep_mode: bool },
    /// The frame receiver completed a frame.
    Frame(RxFrame),
    /// A timer expired; `epoch` identifies the arming it belongs to.
    TimerFired { timer: TimerKind, epoch: u32 },
    /// Self-posted: issue the next read command.
    ReadSensor,
    /// A caller wants a measurement.
    UserRead(R),
}

impl<R> DriverMsg<R> {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Frame(f) => f.name(),
            Self::TimerFired { timer, .. } => timer.name(),
            Self::ReadSensor => "read-sensor",
            Self::UserRead(_) => "user-read",
        }
    }
}

/// Snapshot of driver health, published by the actor after every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub state: DriverState,
    pub pending_readers: usize,
    pub recoveries: u32,
}

pub struct Pms7003Driver<R> {
    state: DriverState,
    config: Pms7003Config,
    use_sleep_mode: bool,
    first_activation: bool,
    readers: ReaderQueue<R>,
    timers: TimerSet,
    recoveries: u32,
    last_fault: Option<SensorError>,
}

impl<R> Pms7003Driver<R> {
    pub fn new(config: Pms7003Config) -> Self {
        Self {
            state: DriverState::Uninitialized,
            use_sleep_mode: config.use_sleep_mode,
            config,
            first_activation: true,
            readers: ReaderQueue::new(),
            timers: TimerSet::new(),
            recoveries: 0,
            last_fault: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn pending_readers(&self) -> usize {
        self.readers.len()
    }

    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    /// Cause of the most recent recovery.
    pub fn last_fault(&self) -> Option<SensorError> {
        self.last_fault
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            state: self.state,
            pending_readers: self.readers.len(),
            recoveries: self.recoveries,
        }
    }

    /// Process one mailbox message to completion.
    pub fn handle<H>(&mut self, msg: DriverMsg<R>, io: &mut H)
    where
        H: UartPort + TimerPort + ActorLink<R>,
    {
        debug!("pms7003: {} in {}", msg.name(), self.state.name());
        match msg {
            DriverMsg::Init { use_sleep_mode } => self.on_init(use_sleep_mode, io),
            DriverMsg::Frame(frame) => self.on_frame(frame, io),
            DriverMsg::TimerFired { timer, epoch } => self.on_timer(timer, epoch, io),
            DriverMsg::ReadSensor => self.on_read_sensor(io),
            DriverMsg::UserRead(reader) => self.on_user_read(reader, io),
        }
    }

    fn on_init<H>(&mut self, use_sleep_mode: bool, io: &mut H)
    where
        H: UartPort + TimerPort,
    {
        use DriverState as S;
        match self.state {
            S::Uninitialized => {
                info!("pms7003: init (sleep mode {})", if use_sleep_mode { "on" } else { "off" });
                self.use_sleep_mode = use_sleep_mode;
                self.command(Command::Wake, io);
                self.transition(S::Initializing);
            }
            S::Initializing
            | S::SleepingUnconfirmed
            | S::Sleeping
            | S::PassiveUnconfirmed
            | S::ExitingSleep
            | S::Passive
            | S::ReadReady
            | S::ReadAsked
            | S::Cooldown => {
                warn!("pms7003: init ignored, already in {}", self.state.name());
            }
        }
    }

    fn on_frame<H>(&mut self, frame: RxFrame, io: &mut H)
    where
        H: UartPort + TimerPort + ActorLink<R>,
    {
        use DriverState as S;
        if self.state == S::Uninitialized {
            debug!("pms7003: {} frame before init, ignored", frame.name());
            return;
        }

        // Any frame answers the outstanding command.
        self.timers.disarm(TimerKind::NoResponse, io);

        match (self.state, frame) {
            (S::Initializing, RxFrame::Data(_)) => {
                if self.first_activation {
                    self.first_activation = false;
                    info!("pms7003: sensor responding");
                    io.signal_ready();
                }
                if self.use_sleep_mode && self.readers.is_empty() {
                    self.command(Command::Sleep, io);
                    self.transition(S::SleepingUnconfirmed);
                } else {
                    self.command(Command::PassiveMode, io);
                    self.transition(S::PassiveUnconfirmed);
                }
            }
            (S::ExitingSleep, RxFrame::Data(_)) => {
                self.command(Command::PassiveMode, io);
                self.transition(S::PassiveUnconfirmed);
            }
            (S::ReadAsked, RxFrame::Data(m)) => self.complete_read(m, io),
            (S::SleepingUnconfirmed, RxFrame::SleepConfirm) => {
                self.transition(S::Sleeping);
                // A reader queued while the sleep command was in flight.
                if !self.readers.is_empty() {
                    self.command(Command::Wake, io);
                    self.transition(S::ExitingSleep);
                }
            }
            (S::PassiveUnconfirmed, RxFrame::PassiveConfirm) => {
                self.start_timer(TimerKind::ValidData, io);
                self.transition(S::Passive);
            }
            (_, RxFrame::ChecksumMismatch) => self.recover(SensorError::Transport, io),
            (
                S::Uninitialized
                | S::Initializing
                | S::SleepingUnconfirmed
                | S::Sleeping
                | S::PassiveUnconfirmed
                | S::ExitingSleep
                | S::Passive
                | S::ReadReady
                | S::ReadAsked
                | S::Cooldown,
                RxFrame::Data(_)
                | RxFrame::ActiveConfirm
                | RxFrame::PassiveConfirm
                | RxFrame::SleepConfirm,
            ) => {
                warn!(
                    "pms7003: unexpected {} frame in {}",
                    frame.name(),
                    self.state.name()
                );
                self.recover(SensorError::ProtocolViolation, io);
            }
        }
    }

    fn on_timer<H>(&mut self, timer: TimerKind, epoch: u32, io: &mut H)
    where
        H: UartPort + TimerPort + ActorLink<R>,
    {
        use DriverState as S;
        if !self.timers.accept(timer, epoch) {
            debug!("pms7003: stale {} timer (epoch {})", timer.name(), epoch);
            return;
        }

        match (timer, self.state) {
            (TimerKind::NoResponse, _) => self.recover(SensorError::WatchdogTimeout, io),
            (TimerKind::ValidData, S::Passive) | (TimerKind::ReadCooldown, S::Cooldown) => {
                self.schedule_read(io);
            }
            (TimerKind::AutoSleep, S::ReadReady) => {
                if self.readers.is_empty() {
                    info!("pms7003: idle, putting sensor to sleep");
                    self.command(Command::Sleep, io);
                    self.transition(S::SleepingUnconfirmed);
                } else {
                    debug!("pms7003: auto-sleep skipped, {} readers waiting", self.readers.len());
                }
            }
            // Mid-cycle: try again once the driver is back in read_ready.
            (TimerKind::AutoSleep, S::ReadAsked | S::Cooldown) => {
                debug!("pms7003: auto-sleep deferred in {}", self.state.name());
                self.start_timer(TimerKind::AutoSleep, io);
            }
            (
                TimerKind::ValidData | TimerKind::ReadCooldown | TimerKind::AutoSleep,
                S::Uninitialized
                | S::Initializing
                | S::SleepingUnconfirmed
                | S::Sleeping
                | S::PassiveUnconfirmed
                | S::ExitingSleep
                | S::Passive
                | S::ReadReady
                | S::ReadAsked
                | S::Cooldown,
            ) => {
                warn!(
                    "pms7003: {} timer fired in {}",
                    timer.name(),
                    self.state.name()
                );
                self.recover(SensorError::ProtocolViolation, io);
            }
        }
    }

    fn on_read_sensor<H>(&mut self, io: &mut H)
    where
        H: UartPort + TimerPort,
    {
        use DriverState as S;
        match self.state {
            S::ReadReady => self.start_read(io),
            // Stale request: either its read is already under way or a
            // recovery or sleep cycle overtook it. Readers stay queued and
            // the next read_ready serves them.
            S::Uninitialized
            | S::Initializing
            | S::SleepingUnconfirmed
            | S::Sleeping
            | S::PassiveUnconfirmed
            | S::ExitingSleep
            | S::Passive
            | S::ReadAsked
            | S::Cooldown => {
                debug!("pms7003: read request ignored in {}", self.state.name());
            }
        }
    }

    fn on_user_read<H>(&mut self, reader: R, io: &mut H)
    where
        H: UartPort + TimerPort + ActorLink<R>,
    {
        use DriverState as S;
        if self.state == S::Uninitialized {
            io.deliver(reader, Err(SensorError::NotInitialized));
            return;
        }
        if let Err(QueueFull(reader)) = self.readers.enqueue(reader) {
            warn!("pms7003: reader rejected, queue full");
            io.deliver(reader, Err(SensorError::QueueFull));
            return;
        }
        debug!(
            "pms7003: reader queued ({}/{})",
            self.readers.len(),
            READER_QUEUE_CAPACITY
        );

        match self.state {
            S::ReadReady => {
                if !io.post(DriverMsg::ReadSensor) {
                    self.start_read(io);
                }
            }
            S::Sleeping => {
                self.command(Command::Wake, io);
                self.transition(S::ExitingSleep);
            }
            // Served once the current cycle reaches read_ready.
            S::Uninitialized
            | S::Initializing
            | S::SleepingUnconfirmed
            | S::PassiveUnconfirmed
            | S::ExitingSleep
            | S::Passive
            | S::ReadAsked
            | S::Cooldown => {}
        }
    }

    /// Enter `read_ready` and kick off a read if anyone is waiting.
    fn schedule_read<H>(&mut self, io: &mut H)
    where
        H: UartPort + TimerPort + ActorLink<R>,
    {
        self.transition(DriverState::ReadReady);
        if !self.readers.is_empty() && !io.post(DriverMsg::ReadSensor) {
            // Mailbox full: issue the read directly.
            self.start_read(io);
        }
    }

    fn start_read<H>(&mut self, io: &mut H)
    where
        H: UartPort + TimerPort,
    {
        self.command(Command::Read, io);
        self.transition(DriverState::ReadAsked);
    }

    fn complete_read<H>(&mut self, m: Measurement, io: &mut H)
    where
        H: UartPort + TimerPort + ActorLink<R>,
    {
        self.start_timer(TimerKind::ReadCooldown, io);
        match self.readers.dequeue() {
            Ok(reader) => io.deliver(reader, Ok(m)),
            Err(_) => warn!("pms7003: measurement with no reader waiting, dropped"),
        }
        if self.use_sleep_mode {
            self.start_timer(TimerKind::AutoSleep, io);
        }
        self.transition(DriverState::Cooldown);
    }

    /// Write a command frame and start the no-response watchdog.
    fn command<H>(&mut self, cmd: Command, io: &mut H)
    where
        H: UartPort + TimerPort,
    {
        debug!("pms7003: -> {}", cmd.name());
        if let Err(e) = io.write(&cmd.frame()) {
            // The watchdog below turns a lost command into a recovery.
            warn!("pms7003: {} command: {}", cmd.name(), e);
        }
        self.start_timer(TimerKind::NoResponse, io);
    }

    fn start_timer(&mut self, kind: TimerKind, io: &mut impl TimerPort) {
        self.timers.arm(kind, kind.delay_ms(&self.config), io);
    }

    /// Universal recovery: drop timers and partial frames, wake the sensor
    /// and start over from `initializing`. Waiting readers stay queued.
    fn recover<H>(&mut self, cause: SensorError, io: &mut H)
    where
        H: UartPort + TimerPort + ActorLink<R>,
    {
        self.recoveries = self.recoveries.wrapping_add(1);
        self.last_fault = Some(cause);
        warn!(
            "pms7003: {} in {}, re-initialising (recovery #{})",
            cause,
            self.state.name(),
            self.recoveries
        );
        for kind in [TimerKind::ValidData, TimerKind::ReadCooldown, TimerKind::AutoSleep] {
            self.timers.disarm(kind, io);
        }
        io.resync_receiver();
        self.command(Command::Wake, io);
        self.transition(DriverState::Initializing);
    }

    fn transition(&mut self, next: DriverState) {
        if next != self.state {
            debug!("pms7003: {} -> {}", self.state.name(), next.name());
            self.state = next;
        }
    }
}
