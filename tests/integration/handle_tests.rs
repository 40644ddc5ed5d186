//! Threaded tests of the blocking `Pms7003` handle against a simulated
//! sensor that answers every command on the spot.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use airnode::app::ports::UartPort;
use airnode::config::Pms7003Config;
use airnode::error::SensorError;
use airnode::sensors::pms7003::frame::{Command, ServiceFrame, encode_data_frame};
use airnode::sensors::pms7003::{DriverState, Measurement, Pms7003, RxHandler};

type Link = Arc<Mutex<Option<RxHandler>>>;

struct SimSensor {
    link: Link,
    writes: Arc<Mutex<Vec<Command>>>,
    silent: bool,
    reads: u16,
    /// Extra latency before the first reply, as a slow fan spin-up.
    wake_latency: Duration,
}

impl UartPort for SimSensor {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        let cmd = Command::from_frame(bytes).ok_or(SensorError::Uart)?;
        self.writes.lock().unwrap().push(cmd);
        if self.silent {
            return Ok(());
        }
        thread::sleep(std::mem::take(&mut self.wake_latency));
        let reply: Vec<u8> = match cmd {
            Command::Wake => encode_data_frame(&Measurement::default()).to_vec(),
            Command::PassiveMode => ServiceFrame::PassiveConfirm.frame().to_vec(),
            Command::Sleep => ServiceFrame::SleepConfirm.frame().to_vec(),
            Command::Read => {
                self.reads += 1;
                encode_data_frame(&Measurement::from_fields([self.reads; 12])).to_vec()
            }
        };
        if let Some(rx) = self.link.lock().unwrap().as_mut() {
            rx.on_bytes(&reply);
        }
        Ok(())
    }
}

struct Rig {
    sensor: Pms7003<SimSensor>,
    writes: Arc<Mutex<Vec<Command>>>,
}

impl Rig {
    fn writes(&self) -> Vec<Command> {
        self.writes.lock().unwrap().clone()
    }

    fn wait_for_state(&self, state: DriverState, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.sensor.stats().state == state {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

fn fast_config() -> Pms7003Config {
    Pms7003Config {
        response_timeout_ms: 500,
        warmup_ms: 30,
        read_cooldown_ms: 5,
        auto_sleep_ms: 40,
        init_timeout_ms: 2000,
        ..Pms7003Config::default()
    }
}

fn rig(config: Pms7003Config, silent: bool) -> Rig {
    rig_with_latency(config, silent, Duration::ZERO)
}

fn rig_with_latency(config: Pms7003Config, silent: bool, wake_latency: Duration) -> Rig {
    let link: Link = Arc::new(Mutex::new(None));
    let writes = Arc::new(Mutex::new(Vec::new()));
    let sim = SimSensor {
        link: Arc::clone(&link),
        writes: Arc::clone(&writes),
        silent,
        reads: 0,
        wake_latency,
    };
    let sensor = Pms7003::new(sim, config);
    *link.lock().unwrap() = Some(sensor.rx_handler());
    Rig { sensor, writes }
}

#[test]
fn measure_before_init_is_rejected() {
    let rig = rig(fast_config(), false);
    assert_eq!(rig.sensor.measure(), Err(SensorError::NotInitialized));
    assert!(!rig.sensor.is_running());
    assert!(rig.writes().is_empty());
}

#[test]
fn init_then_measure_without_sleep_mode() {
    let rig = rig(fast_config(), false);
    rig.sensor.init(false).unwrap();
    assert!(rig.sensor.is_running());

    let first = rig.sensor.measure().unwrap();
    let second = rig.sensor.measure().unwrap();
    assert_eq!(first, Measurement::from_fields([1; 12]));
    assert_eq!(second, Measurement::from_fields([2; 12]));

    assert!(!rig.writes().contains(&Command::Sleep));
    assert_eq!(rig.sensor.stats().recoveries, 0);
}

#[test]
fn second_init_returns_immediately() {
    let rig = rig(fast_config(), false);
    rig.sensor.init(false).unwrap();
    let t0 = Instant::now();
    rig.sensor.init(true).unwrap();
    assert!(t0.elapsed() < Duration::from_millis(100));
    assert_eq!(
        rig.writes().iter().filter(|c| **c == Command::Wake).count(),
        1
    );
}

#[test]
fn sleep_mode_wakes_for_a_read_and_sleeps_again() {
    let rig = rig(fast_config(), false);
    rig.sensor.init(true).unwrap();
    assert!(rig.wait_for_state(DriverState::Sleeping, Duration::from_secs(1)));

    let m = rig.sensor.measure().unwrap();
    assert_eq!(m, Measurement::from_fields([1; 12]));

    assert!(rig.wait_for_state(DriverState::Sleeping, Duration::from_secs(2)));
    assert_eq!(
        rig.writes(),
        vec![
            Command::Wake,
            Command::Sleep,
            Command::Wake,
            Command::PassiveMode,
            Command::Read,
            Command::Sleep,
        ]
    );
}

#[test]
fn concurrent_callers_get_distinct_measurements_in_call_order() {
    let rig = rig(fast_config(), false);
    rig.sensor.init(false).unwrap();

    let results: Vec<Measurement> = thread::scope(|s| {
        let handles: Vec<_> = (0..3u64)
            .map(|i| {
                let sensor = &rig.sensor;
                s.spawn(move || {
                    thread::sleep(Duration::from_millis(15 * i));
                    sensor.measure().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let firsts: Vec<u16> = results.iter().map(|m| m.pm1_0_standard).collect();
    assert!(
        firsts.windows(2).all(|w| w[0] < w[1]),
        "replies out of order: {:?}",
        firsts
    );
}

#[test]
fn silent_sensor_fails_init_and_keeps_retrying() {
    let config = Pms7003Config {
        response_timeout_ms: 40,
        init_timeout_ms: 300,
        ..fast_config()
    };
    let rig = rig(config, true);

    assert_eq!(rig.sensor.init(false), Err(SensorError::InitFailed));
    assert!(rig.sensor.is_running());

    thread::sleep(Duration::from_millis(100));
    let wakes = rig.writes().iter().filter(|c| **c == Command::Wake).count();
    assert!(wakes >= 3, "expected repeated wake attempts, got {}", wakes);
    assert!(rig.sensor.stats().recoveries >= 2);
    assert_eq!(rig.sensor.stats().state, DriverState::Initializing);
}

#[test]
fn eleventh_concurrent_caller_gets_queue_full() {
    let config = Pms7003Config {
        init_timeout_ms: 50,
        ..fast_config()
    };
    let rig = Arc::new(rig(config, true));
    assert_eq!(rig.sensor.init(false), Err(SensorError::InitFailed));

    // These callers never get an answer from a silent sensor.
    for _ in 0..10 {
        let rig = Arc::clone(&rig);
        thread::spawn(move || {
            let _ = rig.sensor.measure();
        });
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    while rig.sensor.stats().pending_readers < 10 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(rig.sensor.stats().pending_readers, 10);
    assert_eq!(rig.sensor.measure(), Err(SensorError::QueueFull));
}

#[test]
fn concurrent_init_callers_all_return_once_sensor_answers() {
    let config = Pms7003Config {
        init_timeout_ms: 3000,
        ..fast_config()
    };
    let rig = rig_with_latency(config, false, Duration::from_millis(100));

    let elapsed: Vec<(Result<(), SensorError>, Duration)> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let sensor = &rig.sensor;
                s.spawn(move || {
                    let t0 = Instant::now();
                    (sensor.init(false), t0.elapsed())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (result, took) in elapsed {
        assert_eq!(result, Ok(()));
        assert!(took < Duration::from_secs(1), "init blocked for {:?}", took);
    }
    assert_eq!(
        rig.writes().iter().filter(|c| **c == Command::Wake).count(),
        1
    );
}

#[test]
fn measure_racing_init_is_never_turned_away() {
    let rig = rig(fast_config(), false);

    let reading = thread::scope(|s| {
        let sensor = &rig.sensor;
        let reader = s.spawn(move || {
            while !sensor.is_running() {
                thread::yield_now();
            }
            sensor.measure()
        });
        sensor.init(false).unwrap();
        reader.join().unwrap()
    });

    assert_eq!(reading, Ok(Measurement::from_fields([1; 12])));
}
