//! ESP-IDF adapters for the timer, I2S and codec control bus.

use esp_idf_svc::hal::i2s::{I2sDriver, I2sTx};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::timer::{self, TimerDriver};
use esp_idf_svc::sys::EspError;

use crate::audio::FrameWriter;
use crate::tick::{IrqAck, TimerControl, TimerHw};

/// General-purpose timer as the tick countdown.
///
/// The driver is created with auto-reload on; IDF's ISR wrapper clears the
/// interrupt status and re-arms the alarm before calling the handler.
pub struct EspTickTimer<'d> {
    driver: TimerDriver<'d>,
}

/// Acknowledge is done by the IDF ISR wrapper.
pub struct DriverAck;

impl IrqAck for DriverAck {
    #[inline]
    fn clear_pending(&mut self) {}
}

impl<'d> EspTickTimer<'d> {
    pub fn new(timer: impl Peripheral<P = impl timer::Timer> + 'd) -> Result<Self, EspError> {
        let config = timer::config::Config::new().auto_reload(true);
        Ok(Self {
            driver: TimerDriver::new(timer, &config)?,
        })
    }
}

impl TimerHw for EspTickTimer<'_> {
    type Error = EspError;
    type Ack = DriverAck;

    fn input_hz(&self) -> u64 {
        self.driver.tick_hz()
    }

    fn reload(&mut self, load: u64, control: TimerControl) -> Result<(), EspError> {
        self.driver.enable(false)?;
        self.driver.set_counter(0)?;
        self.driver.set_alarm(load)?;
        if control.irq_enable {
            self.driver.enable_interrupt()?;
        } else {
            self.driver.disable_interrupt()?;
        }
        self.driver.enable_alarm(true)?;
        self.driver.enable(control.enable)
    }

    fn ack(&self) -> DriverAck {
        DriverAck
    }

    fn register_handler<F>(&mut self, handler: F) -> Result<(), EspError>
    where
        F: FnMut() + Send + 'static,
    {
        // SAFETY: the handler only touches atomics and the ack/watchdog
        // handles moved into it; nothing in it blocks or allocates.
        unsafe { self.driver.subscribe(handler) }?;
        self.driver.enable_interrupt()
    }
}

/// I2S TX channel as a stereo frame FIFO.
///
/// One frame is 8 bytes: left then right, 32-bit little-endian.
pub struct I2sFrameWriter<'d> {
    driver: I2sDriver<'d, I2sTx>,
}

impl<'d> I2sFrameWriter<'d> {
    /// Wrap a configured driver. The channel must already be enabled.
    pub fn new(driver: I2sDriver<'d, I2sTx>) -> Self {
        Self { driver }
    }

    pub fn release(self) -> I2sDriver<'d, I2sTx> {
        self.driver
    }
}

impl FrameWriter for I2sFrameWriter<'_> {
    type Error = EspError;

    fn try_push(&mut self, frame: [i32; 2]) -> bool {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&frame[0].to_le_bytes());
        bytes[4..].copy_from_slice(&frame[1].to_le_bytes());

        // Zero timeout: a full DMA ring returns ESP_ERR_TIMEOUT or 0 bytes.
        // DMA buffers hold whole frames, so a write is all or nothing.
        matches!(self.driver.write(&bytes, 0), Ok(n) if n == bytes.len())
    }

    fn clear(&mut self) -> Result<(), EspError> {
        // Disabling the channel drops queued DMA descriptors.
        self.driver.tx_disable()?;
        self.driver.tx_enable()
    }
}
