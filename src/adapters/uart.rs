//! ESP-IDF UART adapter for the PMS7003.
//!
//! The driver is split: the TX half implements [`UartPort`] and moves into
//! the driver actor, the RX half is drained by a dedicated pump thread that
//! feeds every received byte to the [`RxHandler`].

use std::thread::JoinHandle;

use esp_idf_hal::delay::{BLOCK, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{self, Uart, UartDriver, UartRxDriver, UartTxDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::sys::EspError;
use log::{info, warn};

use crate::app::ports::UartPort;
use crate::drivers::task_pin::{self, Core};
use crate::error::SensorError;
use crate::sensors::pms7003::RxHandler;

const RX_CHUNK: usize = 64;

/// Transmit half of the sensor UART.
pub struct SensorUartTx {
    tx: UartTxDriver<'static>,
}

impl UartPort for SensorUartTx {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        match self.tx.write(bytes) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(n) => {
                warn!("uart: short write {}/{}", n, bytes.len());
                Err(SensorError::Uart)
            }
            Err(e) => {
                warn!("uart: write failed: {}", e);
                Err(SensorError::Uart)
            }
        }
    }
}

/// Configure the UART at `baud_rate` 8N1 and split it.
pub fn open(
    uart: impl Peripheral<P = impl Uart> + 'static,
    tx_pin: impl Peripheral<P = impl OutputPin> + 'static,
    rx_pin: impl Peripheral<P = impl InputPin> + 'static,
    baud_rate: u32,
) -> Result<(SensorUartTx, UartRxDriver<'static>), EspError> {
    let config = uart::config::Config::default().baudrate(Hertz(baud_rate));
    let driver = UartDriver::new(
        uart,
        tx_pin,
        rx_pin,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &config,
    )?;
    let (tx, rx) = driver.into_split();
    info!("uart: sensor link open at {} baud", baud_rate);
    Ok((SensorUartTx { tx }, rx))
}

/// Spawn the RX pump feeding `handler`.
pub fn spawn_rx_pump(
    rx: UartRxDriver<'static>,
    mut handler: RxHandler,
) -> std::io::Result<JoinHandle<()>> {
    task_pin::spawn_on_core(Core::App, 7, 4, "pms-uart-rx\0", move || {
        let mut buf = [0u8; RX_CHUNK];
        loop {
            match rx.read(&mut buf, BLOCK) {
                Ok(n) => handler.on_bytes(&buf[..n]),
                Err(e) => {
                    warn!("uart: read failed: {}", e);
                    FreeRtos::delay_ms(10);
                }
            }
        }
    })
}
