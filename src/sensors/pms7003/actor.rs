//! Actor runtime around [`Pms7003Driver`] and the public blocking API.
//!
//! ```text
//!  UART RX ──▶ RxHandler ──try_send──▶ ┌─────────┐
//!  timer thread ─────────try_send────▶ │ mailbox │──▶ pms-actor ──▶ UART TX
//!  measure()/init() ─────send────────▶ └─────────┘        │
//!        ▲                                                │
//!        └──────────── per-caller reply slot ◀────────────┘
//! ```
//!
//! The actor thread is the only owner of the driver. Everything else talks
//! to it through the mailbox, so no lock is held across a wait.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{error, info, warn};

use crate::app::ports::{ActorLink, TimerPort, UartPort};
use crate::config::Pms7003Config;
use crate::drivers::task_pin::{self, Core};
use crate::error::SensorError;

use super::driver::{DriverMsg, DriverState, DriverStats, MeasureReply, Pms7003Driver};
use super::measurement::Measurement;
use super::receiver::FrameReceiver;
use super::timers::{TimerHandle, TimerKind, spawn_timer_service};

/// Mailbox depth of the driver actor.
pub const MAILBOX_DEPTH: usize = 8;

/// Private reply channel of one `measure()` caller.
pub type ReplySlot = Channel<CriticalSectionRawMutex, MeasureReply, 1>;

/// Caller identity stored in the pending-reader queue.
pub type Reader = Arc<ReplySlot>;

type Mailbox = Channel<CriticalSectionRawMutex, DriverMsg<Reader>, MAILBOX_DEPTH>;

struct Shared {
    mailbox: Mailbox,
    ready: Signal<CriticalSectionRawMutex, ()>,
    initialised: AtomicBool,
    started: AtomicBool,
    /// Set by the actor on recovery, consumed by the receiver.
    resync: AtomicBool,
    /// Frames the receiver could not post; drained by the actor.
    dropped_frames: AtomicU32,
    state: AtomicU8,
    pending: AtomicU8,
    recoveries: AtomicU32,
}

impl Shared {
    fn new() -> Self {
        Self {
            mailbox: Channel::new(),
            ready: Signal::new(),
            initialised: AtomicBool::new(false),
            started: AtomicBool::new(false),
            resync: AtomicBool::new(false),
            dropped_frames: AtomicU32::new(0),
            state: AtomicU8::new(DriverState::Uninitialized as u8),
            pending: AtomicU8::new(0),
            recoveries: AtomicU32::new(0),
        }
    }

    fn publish(&self, stats: DriverStats) {
        self.state.store(stats.state as u8, Ordering::Relaxed);
        self.pending
            .store(stats.pending_readers as u8, Ordering::Relaxed);
        self.recoveries.store(stats.recoveries, Ordering::Relaxed);
    }
}

/// Handle to a PMS7003 on a UART. Cheap to share between threads by
/// reference; `init` and `measure` may be called from any of them.
pub struct Pms7003<U> {
    shared: Arc<Shared>,
    config: Pms7003Config,
    uart: Mutex<Option<U>>,
}

impl<U> Pms7003<U>
where
    U: UartPort + Send + 'static,
{
    pub fn new(uart: U, config: Pms7003Config) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            config,
            uart: Mutex::new(Some(uart)),
        }
    }

    /// Byte sink for the UART receive path. Create exactly one per sensor.
    pub fn rx_handler(&self) -> RxHandler {
        RxHandler {
            receiver: FrameReceiver::new(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start the actor (once) and wait for the sensor's first data frame.
    ///
    /// Concurrent callers are serialised; a caller that queued behind a
    /// successful handshake returns `Ok` as soon as it gets the lock.
    /// On `InitFailed` the driver keeps running and retrying the handshake
    /// in the background; the caller may retry or proceed degraded.
    pub fn init(&self, use_sleep_mode: bool) -> Result<(), SensorError> {
        if self.shared.initialised.load(Ordering::Acquire) {
            return Ok(());
        }
        // Held for the whole handshake: `ready` wakes a single waiter.
        let mut slot = self.uart.lock().map_err(|_| SensorError::InitFailed)?;
        if self.shared.initialised.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(uart) = slot.take() {
            self.start(uart, use_sleep_mode)?;
        }

        let timeout = Duration::from_millis(u64::from(self.config.init_timeout_ms));
        let acked = future::block_on(future::or(
            async {
                self.shared.ready.wait().await;
                true
            },
            async {
                async_io_mini::Timer::after(timeout).await;
                false
            },
        ));

        if acked || self.shared.initialised.load(Ordering::Acquire) {
            info!("pms7003: initialised");
            Ok(())
        } else {
            warn!(
                "pms7003: no answer within {} ms, continuing in background",
                self.config.init_timeout_ms
            );
            Err(SensorError::InitFailed)
        }
    }

    /// Block until the driver delivers a measurement.
    ///
    /// Fails with `NotInitialized` before the first `init()` and with
    /// `QueueFull` when ten callers are already waiting. There is no
    /// timeout: a stalled driver blocks the caller.
    pub fn measure(&self) -> Result<Measurement, SensorError> {
        if !self.shared.started.load(Ordering::Acquire) {
            return Err(SensorError::NotInitialized);
        }
        let slot: Reader = Arc::new(Channel::new());
        future::block_on(
            self.shared
                .mailbox
                .send(DriverMsg::UserRead(Arc::clone(&slot))),
        );
        future::block_on(slot.receive())
    }

    pub fn is_running(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    /// Driver statistics as of the last processed message.
    pub fn stats(&self) -> DriverStats {
        DriverStats {
            state: DriverState::from_index(self.shared.state.load(Ordering::Relaxed)),
            pending_readers: usize::from(self.shared.pending.load(Ordering::Relaxed)),
            recoveries: self.shared.recoveries.load(Ordering::Relaxed),
        }
    }

    /// Spawn the timer service and the actor, then queue `Init` ahead of
    /// any reader: `measure()` is only accepted once `started` is set.
    fn start(&self, uart: U, use_sleep_mode: bool) -> Result<(), SensorError> {
        let timer_shared = Arc::clone(&self.shared);
        let timers = spawn_timer_service(move |timer, epoch| {
            timer_shared
                .mailbox
                .try_send(DriverMsg::TimerFired { timer, epoch })
                .is_ok()
        })
        .map_err(|e| {
            error!("pms7003: timer service spawn failed: {}", e);
            SensorError::InitFailed
        })?;

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        task_pin::spawn_on_core(Core::App, 5, 8, "pms-actor\0", move || {
            run_actor(&shared, uart, timers, config);
        })
        .map_err(|e| {
            error!("pms7003: actor spawn failed: {}", e);
            SensorError::InitFailed
        })?;

        future::block_on(self.shared.mailbox.send(DriverMsg::Init { use_sleep_mode }));
        self.shared.started.store(true, Ordering::Release);
        Ok(())
    }
}

fn run_actor<U: UartPort>(shared: &Shared, uart: U, timers: TimerHandle, config: Pms7003Config) {
    let mut driver: Pms7003Driver<Reader> = Pms7003Driver::new(config);
    let mut io = ActorIo {
        uart,
        timers,
        shared,
    };
    info!("pms7003: actor running");

    loop {
        let msg = future::block_on(shared.mailbox.receive());
        let dropped = shared.dropped_frames.swap(0, Ordering::AcqRel);
        if dropped > 0 {
            warn!("pms7003: {} frame(s) dropped, mailbox full", dropped);
        }
        driver.handle(msg, &mut io);
        shared.publish(driver.stats());
    }
}

/// The actor's side of every port.
struct ActorIo<'a, U> {
    uart: U,
    timers: TimerHandle,
    shared: &'a Shared,
}

impl<U: UartPort> UartPort for ActorIo<'_, U> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        self.uart.write(bytes)
    }
}

impl<U> TimerPort for ActorIo<'_, U> {
    fn arm(&mut self, timer: TimerKind, epoch: u32, delay_ms: u32) {
        self.timers.arm(timer, epoch, delay_ms);
    }

    fn cancel(&mut self, timer: TimerKind) {
        self.timers.cancel(timer);
    }
}

impl<U> ActorLink<Reader> for ActorIo<'_, U> {
    fn post(&mut self, msg: DriverMsg<Reader>) -> bool {
        self.shared.mailbox.try_send(msg).is_ok()
    }

    fn deliver(&mut self, reader: Reader, reply: MeasureReply) {
        // Each caller waits for exactly one reply, so the slot is free.
        if reader.try_send(reply).is_err() {
            warn!("pms7003: reply slot occupied, reply dropped");
        }
    }

    fn signal_ready(&mut self) {
        self.shared.initialised.store(true, Ordering::Release);
        self.shared.ready.signal(());
    }

    fn resync_receiver(&mut self) {
        self.shared.resync.store(true, Ordering::Release);
    }
}

/// Per-byte entry point for the UART receive path.
///
/// Never blocks and never logs: completed frames go to the mailbox with
/// `try_send`, and frames that do not fit are only counted.
pub struct RxHandler {
    receiver: FrameReceiver,
    shared: Arc<Shared>,
}

impl RxHandler {
    pub fn on_byte(&mut self, byte: u8) {
        if self.shared.resync.swap(false, Ordering::AcqRel) {
            self.receiver.reset();
        }
        if let Some(frame) = self.receiver.push(byte) {
            if self.shared.mailbox.try_send(DriverMsg::Frame(frame)).is_err() {
                self.shared.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn on_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.on_byte(b);
        }
    }
}
