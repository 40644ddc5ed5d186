//! The driver's four one-shot timeouts.
//!
//! [`TimerSet`] lives inside the driver and tracks which timers are armed
//! and under which epoch. Every arming bumps the epoch, so a fire message
//! that was already in flight when the timer was re-armed or cancelled is
//! recognised as stale and dropped by [`TimerSet::accept`].
//!
//! [`spawn_timer_service`] runs the deadlines on a dedicated thread and
//! posts fires back into the driver mailbox without ever blocking on it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future;
use log::debug;

use crate::app::ports::TimerPort;
use crate::config::Pms7003Config;
use crate::drivers::task_pin::{self, Core};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Armed after every outbound command; firing means the sensor is silent.
    NoResponse,
    /// Fan warm-up after passive mode is confirmed.
    ValidData,
    /// Gap between two read commands.
    ReadCooldown,
    /// Idle delay before the sensor is put back to sleep.
    AutoSleep,
}

impl TimerKind {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [
        Self::NoResponse,
        Self::ValidData,
        Self::ReadCooldown,
        Self::AutoSleep,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::NoResponse => "no-response",
            Self::ValidData => "valid-data",
            Self::ReadCooldown => "read-cooldown",
            Self::AutoSleep => "auto-sleep",
        }
    }

    pub const fn delay_ms(self, cfg: &Pms7003Config) -> u32 {
        match self {
            Self::NoResponse => cfg.response_timeout_ms,
            Self::ValidData => cfg.warmup_ms,
            Self::ReadCooldown => cfg.read_cooldown_ms,
            Self::AutoSleep => cfg.auto_sleep_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Driver-side bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TimerSet {
    epochs: [u32; TimerKind::COUNT],
    armed: [bool; TimerKind::COUNT],
}

impl TimerSet {
    pub const fn new() -> Self {
        Self {
            epochs: [0; TimerKind::COUNT],
            armed: [false; TimerKind::COUNT],
        }
    }

    /// Arm `kind`, replacing any earlier arming.
    pub fn arm(&mut self, kind: TimerKind, delay_ms: u32, port: &mut impl TimerPort) {
        let i = kind.index();
        self.epochs[i] = self.epochs[i].wrapping_add(1);
        self.armed[i] = true;
        port.arm(kind, self.epochs[i], delay_ms);
    }

    pub fn disarm(&mut self, kind: TimerKind, port: &mut impl TimerPort) {
        let i = kind.index();
        if self.armed[i] {
            self.armed[i] = false;
            port.cancel(kind);
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed[kind.index()]
    }

    /// Epoch of the most recent arming of `kind`.
    pub fn epoch(&self, kind: TimerKind) -> u32 {
        self.epochs[kind.index()]
    }

    /// Consume a fire. True only for the live arming, which is then disarmed.
    pub fn accept(&mut self, kind: TimerKind, epoch: u32) -> bool {
        let i = kind.index();
        if self.armed[i] && self.epochs[i] == epoch {
            self.armed[i] = false;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Timer service thread
// ---------------------------------------------------------------------------

/// Control messages from the driver to the timer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCtl {
    Arm {
        timer: TimerKind,
        epoch: u32,
        delay_ms: u32,
    },
    Cancel(TimerKind),
}

const CTL_DEPTH: usize = 8;

/// Delay before a fire that found the mailbox full is posted again.
const REPOST_DELAY: Duration = Duration::from_millis(10);

type CtlChannel = Channel<CriticalSectionRawMutex, TimerCtl, CTL_DEPTH>;

/// [`TimerPort`] implementation that forwards to the timer thread.
#[derive(Clone)]
pub struct TimerHandle {
    ctl: Arc<CtlChannel>,
}

impl TimerHandle {
    fn send(&self, msg: TimerCtl) {
        // The timer thread never blocks, so this wait is bounded.
        if let Err(embassy_sync::channel::TrySendError::Full(msg)) = self.ctl.try_send(msg) {
            future::block_on(self.ctl.send(msg));
        }
    }
}

impl TimerPort for TimerHandle {
    fn arm(&mut self, timer: TimerKind, epoch: u32, delay_ms: u32) {
        self.send(TimerCtl::Arm {
            timer,
            epoch,
            delay_ms,
        });
    }

    fn cancel(&mut self, timer: TimerKind) {
        self.send(TimerCtl::Cancel(timer));
    }
}

/// Start the timer thread. `post` delivers a fire to the driver and returns
/// false when the mailbox is full; the fire is then retried shortly after.
pub fn spawn_timer_service<F>(post: F) -> std::io::Result<TimerHandle>
where
    F: FnMut(TimerKind, u32) -> bool + Send + 'static,
{
    let ctl: Arc<CtlChannel> = Arc::new(Channel::new());
    let rx = Arc::clone(&ctl);
    task_pin::spawn_on_core(Core::App, 6, 6, "pms-timer\0", move || {
        future::block_on(run_timers(&rx, post));
    })?;
    Ok(TimerHandle { ctl })
}

async fn run_timers<F>(ctl: &CtlChannel, mut post: F)
where
    F: FnMut(TimerKind, u32) -> bool,
{
    let mut deadlines: [Option<(Instant, u32)>; TimerKind::COUNT] = [None; TimerKind::COUNT];

    loop {
        let next = deadlines.iter().flatten().map(|(at, _)| *at).min();
        let expiry = async {
            match next {
                Some(at) => {
                    let wait = at.saturating_duration_since(Instant::now());
                    async_io_mini::Timer::after(wait).await;
                    None
                }
                None => future::pending().await,
            }
        };
        let received = future::or(async { Some(ctl.receive().await) }, expiry).await;

        match received {
            Some(TimerCtl::Arm {
                timer,
                epoch,
                delay_ms,
            }) => {
                let at = Instant::now() + Duration::from_millis(u64::from(delay_ms));
                deadlines[timer.index()] = Some((at, epoch));
            }
            Some(TimerCtl::Cancel(timer)) => deadlines[timer.index()] = None,
            None => {}
        }

        let now = Instant::now();
        for kind in TimerKind::ALL {
            let slot = &mut deadlines[kind.index()];
            let Some((at, epoch)) = *slot else { continue };
            if at > now {
                continue;
            }
            if post(kind, epoch) {
                *slot = None;
            } else {
                debug!("pms7003: mailbox full, re-posting {} timer", kind.name());
                *slot = Some((now + REPOST_DELAY, epoch));
            }
        }
    }
}
