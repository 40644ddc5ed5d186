//! End-to-end driver flows: wire bytes in through the frame receiver,
//! commands and replies out through the recording mock.

use airnode::config::Pms7003Config;
use airnode::error::SensorError;
use airnode::sensors::pms7003::driver::DriverMsg;
use airnode::sensors::pms7003::frame::{Command, ServiceFrame, encode_data_frame};
use airnode::sensors::pms7003::timers::TimerKind;
use airnode::sensors::pms7003::{DriverState, Measurement};

use super::mock_hw::{Bench, IoCall};

fn sample(v: u16) -> Measurement {
    Measurement::from_fields([v, v + 1, v + 2, v, v + 1, v + 2, 100, 50, 20, 5, 1, 0])
}

fn data_bytes(m: &Measurement) -> [u8; 32] {
    encode_data_frame(m)
}

fn confirm(bench: &mut Bench, frame: ServiceFrame) {
    bench.bytes(&frame.frame());
}

/// Sleep mode off, warm-up elapsed, nobody waiting.
fn ready_bench() -> Bench {
    let mut bench = Bench::new(Pms7003Config::default());
    bench.send(DriverMsg::Init {
        use_sleep_mode: false,
    });
    bench.bytes(&data_bytes(&Measurement::default()));
    confirm(&mut bench, ServiceFrame::PassiveConfirm);
    bench.fire(TimerKind::ValidData);
    assert_eq!(bench.state(), DriverState::ReadReady);
    bench
}

// ── Sleep-mode lifecycle ─────────────────────────────────────

#[test]
fn sleep_mode_cycle_from_init_to_auto_sleep() {
    use DriverState as S;
    let mut bench = Bench::new(Pms7003Config::default());

    bench.send(DriverMsg::Init {
        use_sleep_mode: true,
    });
    bench.bytes(&data_bytes(&Measurement::default()));
    confirm(&mut bench, ServiceFrame::SleepConfirm);
    assert_eq!(bench.state(), S::Sleeping);
    assert_eq!(bench.io.count(&IoCall::Ready), 1);

    bench.send(DriverMsg::UserRead(1));
    bench.bytes(&data_bytes(&Measurement::default()));
    confirm(&mut bench, ServiceFrame::PassiveConfirm);
    bench.fire(TimerKind::ValidData);
    let m = sample(12);
    bench.bytes(&data_bytes(&m));
    assert_eq!(bench.io.deliveries(), vec![(1, Ok(m))]);

    bench.fire(TimerKind::ReadCooldown);
    bench.fire(TimerKind::AutoSleep);
    confirm(&mut bench, ServiceFrame::SleepConfirm);

    assert_eq!(
        bench.trace,
        vec![
            S::Uninitialized,
            S::Initializing,
            S::SleepingUnconfirmed,
            S::Sleeping,
            S::ExitingSleep,
            S::PassiveUnconfirmed,
            S::Passive,
            S::ReadReady,
            S::ReadAsked,
            S::Cooldown,
            S::ReadReady,
            S::SleepingUnconfirmed,
            S::Sleeping,
        ]
    );
    assert_eq!(
        bench.io.writes(),
        vec![
            Command::Wake,
            Command::Sleep,
            Command::Wake,
            Command::PassiveMode,
            Command::Read,
            Command::Sleep,
        ]
    );
    assert_eq!(bench.driver.recoveries(), 0);
    assert_eq!(bench.driver.pending_readers(), 0);
}

#[test]
fn auto_sleep_firing_during_cooldown_still_puts_sensor_to_sleep() {
    let config = Pms7003Config {
        auto_sleep_ms: 50,
        read_cooldown_ms: 100,
        ..Pms7003Config::default()
    };
    let mut bench = Bench::new(config);
    bench.send(DriverMsg::Init {
        use_sleep_mode: true,
    });
    bench.bytes(&data_bytes(&Measurement::default()));
    confirm(&mut bench, ServiceFrame::SleepConfirm);
    bench.send(DriverMsg::UserRead(1));
    bench.bytes(&data_bytes(&Measurement::default()));
    confirm(&mut bench, ServiceFrame::PassiveConfirm);
    bench.fire(TimerKind::ValidData);
    bench.bytes(&data_bytes(&sample(8)));
    assert_eq!(bench.state(), DriverState::Cooldown);

    // The shorter auto-sleep deadline expires first.
    bench.fire(TimerKind::AutoSleep);
    bench.fire(TimerKind::ReadCooldown);
    assert_eq!(bench.state(), DriverState::ReadReady);
    assert!(bench.driver.timers().is_armed(TimerKind::AutoSleep));

    bench.fire(TimerKind::AutoSleep);
    confirm(&mut bench, ServiceFrame::SleepConfirm);
    assert_eq!(bench.state(), DriverState::Sleeping);
    assert_eq!(bench.driver.pending_readers(), 0);
    assert_eq!(bench.driver.recoveries(), 0);
}

#[test]
fn reader_queued_during_sleep_command_wakes_sensor_again() {
    let mut bench = Bench::new(Pms7003Config::default());
    bench.send(DriverMsg::Init {
        use_sleep_mode: true,
    });
    bench.bytes(&data_bytes(&Measurement::default()));
    assert_eq!(bench.state(), DriverState::SleepingUnconfirmed);

    bench.send(DriverMsg::UserRead(4));
    confirm(&mut bench, ServiceFrame::SleepConfirm);

    assert_eq!(bench.state(), DriverState::ExitingSleep);
    assert_eq!(
        bench.io.writes(),
        vec![Command::Wake, Command::Sleep, Command::Wake]
    );
}

// ── Reader ordering ──────────────────────────────────────────

#[test]
fn readers_are_served_in_arrival_order() {
    let mut bench = Bench::new(Pms7003Config::default());
    bench.send(DriverMsg::Init {
        use_sleep_mode: false,
    });
    bench.bytes(&data_bytes(&Measurement::default()));
    confirm(&mut bench, ServiceFrame::PassiveConfirm);

    // Queued during warm-up.
    for reader in [1, 2, 3] {
        bench.send(DriverMsg::UserRead(reader));
    }
    assert_eq!(bench.state(), DriverState::Passive);
    assert_eq!(bench.driver.pending_readers(), 3);

    bench.fire(TimerKind::ValidData);
    for v in [10, 20, 30] {
        assert_eq!(bench.state(), DriverState::ReadAsked);
        bench.bytes(&data_bytes(&sample(v)));
        bench.fire(TimerKind::ReadCooldown);
    }

    assert_eq!(
        bench.io.deliveries(),
        vec![(1, Ok(sample(10))), (2, Ok(sample(20))), (3, Ok(sample(30)))]
    );
    assert_eq!(bench.state(), DriverState::ReadReady);
    let reads = bench.io.writes().iter().filter(|c| **c == Command::Read).count();
    assert_eq!(reads, 3);
}

#[test]
fn eleventh_reader_is_rejected_without_disturbing_the_queue() {
    let mut bench = ready_bench();
    bench.send(DriverMsg::Frame(
        airnode::sensors::pms7003::receiver::RxFrame::SleepConfirm,
    ));
    // Recovery parks the driver in initializing; readers pile up.
    assert_eq!(bench.state(), DriverState::Initializing);
    for reader in 0..11 {
        bench.send(DriverMsg::UserRead(reader));
    }
    assert_eq!(bench.driver.pending_readers(), 10);
    assert_eq!(bench.io.deliveries(), vec![(10, Err(SensorError::QueueFull))]);
}

// ── Recovery ─────────────────────────────────────────────────

#[test]
fn corrupted_frame_mid_read_recovers_and_still_serves_reader() {
    let mut bench = ready_bench();
    bench.send(DriverMsg::UserRead(7));
    assert_eq!(bench.state(), DriverState::ReadAsked);

    let mut bad = data_bytes(&sample(1));
    bad[10] ^= 0x40;
    bench.bytes(&bad);

    assert_eq!(bench.state(), DriverState::Initializing);
    assert_eq!(bench.driver.last_fault(), Some(SensorError::Transport));
    assert_eq!(bench.io.count(&IoCall::Resync), 1);
    assert_eq!(bench.driver.pending_readers(), 1);

    bench.bytes(&data_bytes(&Measurement::default()));
    assert_eq!(bench.state(), DriverState::PassiveUnconfirmed);
    confirm(&mut bench, ServiceFrame::PassiveConfirm);
    bench.fire(TimerKind::ValidData);
    bench.bytes(&data_bytes(&sample(42)));

    assert_eq!(bench.io.deliveries(), vec![(7, Ok(sample(42)))]);
    assert_eq!(bench.driver.recoveries(), 1);
    // Readiness is only signalled for the first activation.
    assert_eq!(bench.io.count(&IoCall::Ready), 1);
}

#[test]
fn silent_sensor_keeps_retrying_wake() {
    let mut bench = Bench::new(Pms7003Config::default());
    bench.send(DriverMsg::Init {
        use_sleep_mode: true,
    });
    for _ in 0..3 {
        bench.fire(TimerKind::NoResponse);
    }

    assert_eq!(bench.state(), DriverState::Initializing);
    assert_eq!(bench.driver.recoveries(), 3);
    assert_eq!(bench.driver.last_fault(), Some(SensorError::WatchdogTimeout));
    assert_eq!(bench.io.writes(), vec![Command::Wake; 4]);
    assert_eq!(bench.io.count(&IoCall::Ready), 0);
}

#[test]
fn stale_watchdog_fire_after_reply_is_ignored() {
    let mut bench = Bench::new(Pms7003Config::default());
    bench.send(DriverMsg::Init {
        use_sleep_mode: false,
    });
    let stale = bench.driver.timers().epoch(TimerKind::NoResponse);
    bench.bytes(&data_bytes(&Measurement::default()));
    confirm(&mut bench, ServiceFrame::PassiveConfirm);

    bench.send(DriverMsg::TimerFired {
        timer: TimerKind::NoResponse,
        epoch: stale,
    });

    assert_eq!(bench.state(), DriverState::Passive);
    assert_eq!(bench.driver.recoveries(), 0);
}

#[test]
fn frames_before_init_are_ignored() {
    let mut bench = Bench::new(Pms7003Config::default());
    bench.bytes(&data_bytes(&sample(3)));
    confirm(&mut bench, ServiceFrame::SleepConfirm);

    assert_eq!(bench.state(), DriverState::Uninitialized);
    assert!(bench.io.calls.is_empty());
}
