//! tonegen - plays the two sound effects in a loop.
//!
//! On ESP-IDF:
//! 1. Start the 1 ms tick timer
//! 2. Bring up the WM8731 over I2C, start I2S TX
//! 3. Loop over the effects, draining the log to UART in between
//!
//! On the host the same loop runs against a thread-driven tick and a
//! real-time paced sink, logging to stdout.

use dds_tonegen::tick::TickCounter;

/// Milliseconds since boot.
static TICKS: TickCounter = TickCounter::new();

/// Pause between effects.
const EFFECT_GAP_MS: u32 = 500;

#[cfg(target_os = "espidf")]
fn main() {
    esp_idf_svc::sys::link_patches();

    if let Err(e) = firmware::run() {
        println!("tonegen: {}", e);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    if let Err(e) = host::run() {
        eprintln!("tonegen: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_os = "espidf")]
mod firmware {
    use core::fmt;

    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_svc::hal::i2s::config::{DataBitWidth, StdConfig};
    use esp_idf_svc::hal::i2s::I2sDriver;
    use esp_idf_svc::hal::prelude::*;
    use esp_idf_svc::sys::EspError;

    use dds_tonegen::audio::{ClearError, StereoFrameSink};
    use dds_tonegen::config::{CONFIG, SAMPLE_RATE_HZ};
    use dds_tonegen::dds::{sfx, ToneError, ToneSequencer, WritePolicy};
    use dds_tonegen::hal::esp::{EspTickTimer, I2sFrameWriter};
    use dds_tonegen::hal::{I2cCodecBus, Wm8731, Wm8731Config, Wm8731Error, WM8731_ADDR};
    use dds_tonegen::log_globals::{FAULT_STATE, LOG_STREAM};
    use dds_tonegen::tick::{TickError, TickSource};
    use dds_tonegen::uart_logger::{drain_to_uart, init_uart_logger, UartLoggerConfig};
    use dds_tonegen::{rt_info, rt_warn};

    use super::{EFFECT_GAP_MS, TICKS};

    /// FIFO-full retries per sample before it is dropped.
    const RETRY_BUDGET: u16 = 4096;

    pub enum FirmwareError {
        Esp(EspError),
        Tick(TickError<EspError>),
        Codec(Wm8731Error),
        Sink(ClearError<EspError>),
        Tone(ToneError),
    }

    impl fmt::Display for FirmwareError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Esp(e) => write!(f, "ESP-IDF: {}", e),
                Self::Tick(e) => write!(f, "tick: {}", e),
                Self::Codec(e) => write!(f, "codec: {}", e),
                Self::Sink(e) => write!(f, "sink: {}", e),
                Self::Tone(e) => write!(f, "tone: {}", e),
            }
        }
    }

    impl From<EspError> for FirmwareError {
        fn from(e: EspError) -> Self {
            Self::Esp(e)
        }
    }

    impl From<TickError<EspError>> for FirmwareError {
        fn from(e: TickError<EspError>) -> Self {
            Self::Tick(e)
        }
    }

    impl From<Wm8731Error> for FirmwareError {
        fn from(e: Wm8731Error) -> Self {
            Self::Codec(e)
        }
    }

    impl From<ClearError<EspError>> for FirmwareError {
        fn from(e: ClearError<EspError>) -> Self {
            Self::Sink(e)
        }
    }

    impl From<ToneError> for FirmwareError {
        fn from(e: ToneError) -> Self {
            Self::Tone(e)
        }
    }

    pub fn run() -> Result<(), FirmwareError> {
        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        let mut uart = init_uart_logger(
            peripherals.uart1,
            pins.gpio17,
            &UartLoggerConfig::default(),
        )?;

        // The IDF ISR wrapper re-arms the alarm; the task watchdog cannot be
        // fed from interrupt context, so the tick ISR gets a no-op watchdog.
        let mut ticks = TickSource::new(&TICKS, EspTickTimer::new(peripherals.timer00)?);
        ticks.init(())?;

        let i2c = I2cDriver::new(
            peripherals.i2c0,
            pins.gpio8, // SDA
            pins.gpio9, // SCL
            &I2cConfig::new().baudrate(100.kHz().into()),
        )?;
        let mut bus = I2cCodecBus::new(i2c, WM8731_ADDR);

        // ESP32 drives BCLK/LRCK/MCLK, codec is slave.
        let mut codec = Wm8731::new(Wm8731Config {
            master: false,
            ..Wm8731Config::default()
        });
        codec.init(&mut bus)?;

        let i2s_config = StdConfig::philips(SAMPLE_RATE_HZ, DataBitWidth::Bits32);
        let mut i2s = I2sDriver::new_std_tx(
            peripherals.i2s0,
            &i2s_config,
            pins.gpio5,       // BCLK
            pins.gpio7,       // DOUT
            Some(pins.gpio4), // MCLK
            pins.gpio6,       // WS
        )?;
        i2s.tx_enable()?;

        let mut sink = StereoFrameSink::new(I2sFrameWriter::new(i2s));
        sink.mark_initialized();
        sink.clear_buffers()?;

        CONFIG.set_write_policy(WritePolicy::RetryWithBudget(RETRY_BUDGET));

        let mut seq = ToneSequencer::new(&TICKS, &mut sink, CONFIG.write_policy())?
            .with_log(&LOG_STREAM)
            .with_fault_state(&FAULT_STATE);

        rt_info!(
            LOG_STREAM,
            TICKS.now_ms(),
            "{} running, codec volume 0x{:02X}",
            env!("VERSION_STRING"),
            codec.volume()
        );

        loop {
            for effect in sfx::ALL {
                seq.set_policy(CONFIG.write_policy());
                let report = seq.play_sequence(effect)?;

                if let Some(fault) = FAULT_STATE.take() {
                    rt_warn!(
                        LOG_STREAM,
                        fault.at_ms,
                        "{}: {} writes lost",
                        fault.code.as_str(),
                        fault.dropped
                    );
                }
                rt_info!(
                    LOG_STREAM,
                    TICKS.now_ms(),
                    "effect done: {} notes, {} samples",
                    report.completed,
                    report.samples
                );

                drain_to_uart(&mut uart, &LOG_STREAM);
                FreeRtos::delay_ms(EFFECT_GAP_MS);
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::time::Duration;

    use dds_tonegen::audio::Channel;
    use dds_tonegen::config::{CONFIG, SAMPLE_RATE_HZ};
    use dds_tonegen::dds::{sfx, ToneSequencer};
    use dds_tonegen::log_globals::{FAULT_STATE, LOG_STREAM};
    use dds_tonegen::sim::{PacedSink, ThreadTimer};
    use dds_tonegen::tick::TickSource;
    use dds_tonegen::uart_logger::drain_to_stdout;
    use dds_tonegen::{rt_info, rt_warn};

    use super::{EFFECT_GAP_MS, TICKS};

    /// Host timer input clock.
    const TIMER_HZ: u64 = 1_000_000;
    /// Simulated per-channel FIFO depth.
    const FIFO_DEPTH: u32 = 128;

    pub fn run() -> Result<(), String> {
        println!("{} (host simulation)", env!("VERSION_STRING"));

        let mut ticks = TickSource::new(&TICKS, ThreadTimer::new(TIMER_HZ));
        ticks.init(()).map_err(|e| e.to_string())?;

        let mut sink = PacedSink::new(SAMPLE_RATE_HZ, FIFO_DEPTH);
        let mut seq = ToneSequencer::new(&TICKS, &mut sink, CONFIG.write_policy())
            .map_err(|e| e.to_string())?
            .with_log(&LOG_STREAM)
            .with_fault_state(&FAULT_STATE);

        for effect in sfx::ALL {
            let report = seq.play_sequence(effect).map_err(|e| e.to_string())?;
            if let Some(fault) = FAULT_STATE.take() {
                rt_warn!(
                    LOG_STREAM,
                    fault.at_ms,
                    "{}: {} writes lost",
                    fault.code.as_str(),
                    fault.dropped
                );
            }
            rt_info!(
                LOG_STREAM,
                TICKS.now_ms(),
                "effect done: {} notes, {} samples",
                report.completed,
                report.samples
            );
            drain_to_stdout(&LOG_STREAM);
            std::thread::sleep(Duration::from_millis(u64::from(EFFECT_GAP_MS)));
        }

        let sink = seq.into_sink();
        println!("writes lost since start: {}", FAULT_STATE.total_dropped());
        println!(
            "accepted L/R: {}/{}, rejected L/R: {}/{}",
            sink.accepted(Channel::Left),
            sink.accepted(Channel::Right),
            sink.rejected(Channel::Left),
            sink.rejected(Channel::Right)
        );
        ticks.timer_mut().stop();
        Ok(())
    }
}
