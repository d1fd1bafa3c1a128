//! WM8731 audio codec driver
//!
//! Control port only: register writes over a [`RegisterBus`] (I2C in
//! production). Audio data goes out over I2S through the sample sink.
//! Reference: WM8731 datasheet, register map R0..R9.

use super::RegisterBus;
use crate::config::SAMPLE_RATE_HZ;

/// WM8731 I2C address (CSB = LOW)
pub const WM8731_ADDR: u8 = 0x1A;

/// WM8731 register addresses written by this driver
pub mod regs {
    pub const LEFT_LINE_IN: u8 = 0x00;
    pub const LEFT_HP_OUT: u8 = 0x02;
    pub const ANALOG_PATH: u8 = 0x04;
    pub const DIGITAL_PATH: u8 = 0x05;
    pub const POWER_DOWN: u8 = 0x06;
    pub const DIGITAL_FORMAT: u8 = 0x07;
    pub const SAMPLING: u8 = 0x08;
    pub const ACTIVE: u8 = 0x09;
}

/// Bits written during bring-up
mod bits {
    /// Everything off except the device itself (OUTPD, DACPD on)
    pub const POWER_ALL_DOWN: u16 = 0x17;
    /// Output stage powered, line in/mic/ADC/oscillator still down
    pub const POWER_OUTPUT_UP: u16 = 0x07;
    /// Line in muted, load both channels
    pub const LINE_IN_MUTED_BOTH: u16 = 0x180;
    /// Load both headphone channels
    pub const HP_BOTH: u16 = 0x100;
    /// Headphone volume: 0x79 = 0 dB, 0x7F = +6 dB
    pub const HP_VOL_MASK: u16 = 0x7F;
    /// DAC selected, bypass off, mic muted
    pub const ANALOG_DAC: u16 = 0x12;
    /// 48 kHz de-emphasis, ADC high-pass enabled
    pub const DIGITAL_DEEMPH_48K: u16 = 0x06;
    /// DAC soft mute
    pub const DIGITAL_DACMU: u16 = 0x08;
    /// I2S format, 32-bit words
    pub const FORMAT_I2S_32: u16 = 0x0E;
    /// Codec drives BCLK/LRC
    pub const FORMAT_MASTER: u16 = 0x40;
    /// Normal mode, 256fs, 48 kHz
    pub const SAMPLING_48K: u16 = 0x00;
    pub const ACTIVE: u16 = 0x01;
}

/// One write of the bring-up sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpStep {
    PowerDown,
    LineIn,
    HeadphoneOut,
    AnalogPath,
    DigitalPath,
    DataFormat,
    Sampling,
    Activate,
    PowerUp,
}

impl BringUpStep {
    /// Every step, in execution order.
    pub const SEQUENCE: [BringUpStep; 9] = [
        Self::PowerDown,
        Self::LineIn,
        Self::HeadphoneOut,
        Self::AnalogPath,
        Self::DigitalPath,
        Self::DataFormat,
        Self::Sampling,
        Self::Activate,
        Self::PowerUp,
    ];

    /// Target register.
    pub fn register(self) -> u8 {
        match self {
            Self::PowerDown | Self::PowerUp => regs::POWER_DOWN,
            Self::LineIn => regs::LEFT_LINE_IN,
            Self::HeadphoneOut => regs::LEFT_HP_OUT,
            Self::AnalogPath => regs::ANALOG_PATH,
            Self::DigitalPath => regs::DIGITAL_PATH,
            Self::DataFormat => regs::DIGITAL_FORMAT,
            Self::Sampling => regs::SAMPLING,
            Self::Activate => regs::ACTIVE,
        }
    }
}

/// WM8731 configuration
#[derive(Debug, Clone)]
pub struct Wm8731Config {
    /// Sample rate in Hz. Only 48 kHz is supported.
    pub sample_rate_hz: u32,
    /// Codec is I2S clock master.
    pub master: bool,
    /// Headphone volume code (0x30 = -73 dB .. 0x7F = +6 dB).
    pub headphone_volume: u8,
}

impl Default for Wm8731Config {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            master: true,
            headphone_volume: 0x79,
        }
    }
}

/// WM8731 driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wm8731Error {
    /// Control bus write failed during bring-up
    Bus { step: BringUpStep },
    /// Control bus write failed after bring-up
    Write { reg: u8 },
    /// Invalid configuration
    InvalidConfig,
    /// Bring-up has not completed
    NotInitialized,
}

impl core::fmt::Display for Wm8731Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus { step } => write!(f, "WM8731 bring-up failed at {:?}", step),
            Self::Write { reg } => write!(f, "WM8731 write to R{} failed", reg),
            Self::InvalidConfig => f.write_str("WM8731 invalid config"),
            Self::NotInitialized => f.write_str("WM8731 not initialized"),
        }
    }
}

/// WM8731 driver
pub struct Wm8731 {
    config: Wm8731Config,
    volume: u8,
    muted: bool,
    initialized: bool,
}

impl Wm8731 {
    /// Create new WM8731 driver
    pub fn new(config: Wm8731Config) -> Self {
        Self {
            volume: config.headphone_volume.min(bits::HP_VOL_MASK as u8),
            config,
            muted: false,
            initialized: false,
        }
    }

    /// Value written at `step` for this configuration.
    pub fn step_value(&self, step: BringUpStep) -> u16 {
        match step {
            BringUpStep::PowerDown => bits::POWER_ALL_DOWN,
            BringUpStep::LineIn => bits::LINE_IN_MUTED_BOTH,
            BringUpStep::HeadphoneOut => bits::HP_BOTH | u16::from(self.volume),
            BringUpStep::AnalogPath => bits::ANALOG_DAC,
            BringUpStep::DigitalPath => self.digital_path(),
            BringUpStep::DataFormat => {
                if self.config.master {
                    bits::FORMAT_I2S_32 | bits::FORMAT_MASTER
                } else {
                    bits::FORMAT_I2S_32
                }
            }
            BringUpStep::Sampling => bits::SAMPLING_48K,
            BringUpStep::Activate => bits::ACTIVE,
            BringUpStep::PowerUp => bits::POWER_OUTPUT_UP,
        }
    }

    /// Run the bring-up sequence, stopping at the first failed write.
    pub fn init<B: RegisterBus>(&mut self, bus: &mut B) -> Result<(), Wm8731Error> {
        if self.config.sample_rate_hz != SAMPLE_RATE_HZ {
            return Err(Wm8731Error::InvalidConfig);
        }

        self.initialized = false;
        for step in BringUpStep::SEQUENCE {
            bus.write_register(step.register(), self.step_value(step))
                .map_err(|_| Wm8731Error::Bus { step })?;
        }

        self.initialized = true;
        Ok(())
    }

    /// Bring-up completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Set headphone volume (both channels), clamped to 0x7F.
    pub fn set_volume<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        volume: u8,
    ) -> Result<(), Wm8731Error> {
        self.require_init()?;
        let volume = volume.min(bits::HP_VOL_MASK as u8);
        self.write(bus, regs::LEFT_HP_OUT, bits::HP_BOTH | u16::from(volume))?;
        self.volume = volume;
        Ok(())
    }

    /// Soft-mute the DAC.
    pub fn mute<B: RegisterBus>(&mut self, bus: &mut B, mute: bool) -> Result<(), Wm8731Error> {
        self.require_init()?;
        let previous = self.muted;
        self.muted = mute;
        let value = self.digital_path();
        if let Err(e) = self.write(bus, regs::DIGITAL_PATH, value) {
            self.muted = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Get current volume code
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn config(&self) -> &Wm8731Config {
        &self.config
    }

    fn digital_path(&self) -> u16 {
        if self.muted {
            bits::DIGITAL_DEEMPH_48K | bits::DIGITAL_DACMU
        } else {
            bits::DIGITAL_DEEMPH_48K
        }
    }

    fn require_init(&self) -> Result<(), Wm8731Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Wm8731Error::NotInitialized)
        }
    }

    fn write<B: RegisterBus>(&self, bus: &mut B, reg: u8, value: u16) -> Result<(), Wm8731Error> {
        bus.write_register(reg, value)
            .map_err(|_| Wm8731Error::Write { reg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_values() {
        let codec = Wm8731::new(Wm8731Config::default());
        let values: Vec<(u8, u16)> = BringUpStep::SEQUENCE
            .iter()
            .map(|&s| (s.register(), codec.step_value(s)))
            .collect();

        assert_eq!(
            values,
            [
                (0x06, 0x17),
                (0x00, 0x180),
                (0x02, 0x179),
                (0x04, 0x12),
                (0x05, 0x06),
                (0x07, 0x4E),
                (0x08, 0x00),
                (0x09, 0x01),
                (0x06, 0x07),
            ]
        );
    }

    #[test]
    fn test_slave_format() {
        let codec = Wm8731::new(Wm8731Config {
            master: false,
            ..Wm8731Config::default()
        });
        assert_eq!(codec.step_value(BringUpStep::DataFormat), 0x0E);
    }
}
