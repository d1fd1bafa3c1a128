//! Hardware Abstraction Layer.
//!
//! Thin adapters between the core and the peripherals.
//! Business logic stays in core modules, HAL is just I/O.
//!
//! - `RegisterBus`: register-style write primitive for the codec
//! - `wm8731`: codec bring-up sequence over a `RegisterBus`
//! - `esp`: ESP-IDF timer and I2S adapters (espidf target only). The IDF
//!   I2C driver implements `embedded_hal::i2c::I2c` and plugs into
//!   `I2cCodecBus` directly.

pub mod wm8731;

#[cfg(target_os = "espidf")]
pub mod esp;

pub use wm8731::{BringUpStep, Wm8731, Wm8731Config, Wm8731Error, WM8731_ADDR};

/// Register-style write access to a control-port device.
pub trait RegisterBus {
    /// Transport error.
    type Error: core::fmt::Debug;

    /// Write `value` to register `reg`.
    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), Self::Error>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    type Error = B::Error;

    #[inline]
    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), Self::Error> {
        (**self).write_register(reg, value)
    }
}

/// WM8731 control word: 7-bit register address over 9 data bits.
#[inline]
pub fn encode_control_word(reg: u8, value: u16) -> [u8; 2] {
    let word = (u16::from(reg & 0x7F) << 9) | (value & 0x01FF);
    word.to_be_bytes()
}

/// [`RegisterBus`] over an `embedded-hal` I2C bus.
///
/// Each register write is one two-byte I2C write transaction.
pub struct I2cCodecBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: embedded_hal::i2c::I2c> I2cCodecBus<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Release the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: embedded_hal::i2c::I2c> RegisterBus for I2cCodecBus<I2C> {
    type Error = I2C::Error;

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &encode_control_word(reg, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_word_layout() {
        // R2 = left headphone out, 0x179
        assert_eq!(encode_control_word(0x02, 0x179), [0x05, 0x79]);
        // R4 analog path, 0x12
        assert_eq!(encode_control_word(0x04, 0x12), [0x08, 0x12]);
        // data is masked to 9 bits
        assert_eq!(encode_control_word(0x00, 0xFFFF), [0x01, 0xFF]);
    }
}
