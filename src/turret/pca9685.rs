// PCA9685 16-channel PWM driver
//
// Register-level protocol per the NXP datasheet. The chip is operated at a
// fixed 50 Hz (20 ms period, 12-bit duty resolution), so one count is
// 20000/4096 us. The I2C transport sits behind [`I2cBus`] so the register
// logic is testable off-target; the real Linux adapter is gated behind the
// `rpi-hw` feature.

use std::thread::sleep;
use std::time::Duration;

use tracing::debug;

use super::PulseDriver;

/// The only frequency the turret servos are driven at.
pub const PWM_FREQUENCY_HZ: f64 = 50.0;
pub const PWM_PERIOD_US: u32 = 20_000;
pub const DUTY_RESOLUTION: u32 = 4096;
pub const NUM_CHANNELS: u8 = 16;

/// Internal oscillator of the PCA9685.
const OSCILLATOR_HZ: f64 = 25_000_000.0;

/// Register addresses
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum Register {
    Mode1 = 0x00,
    Led0OnL = 0x06,
    Prescale = 0xFE,
}

/// MODE1 bits
const MODE1_SLEEP: u8 = 0x10;
const MODE1_RESTART: u8 = 0x80;

#[derive(Debug, thiserror::Error)]
pub enum PwmError {
    #[error("I2C bus error: {0}")]
    Bus(String),

    #[error("channel {0} out of range (0-15)")]
    BadChannel(u8),

    #[error("pulse width {0}us does not fit the 20ms period")]
    BadPulse(u16),

    #[error("PWM hardware support not compiled in (enable the rpi-hw feature)")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, PwmError>;

/// Byte-register transport to the chip.
pub trait I2cBus: Send {
    fn write_register(&mut self, reg: u8, value: u8) -> Result<()>;
    fn read_register(&mut self, reg: u8) -> Result<u8>;
}

/// Driver for one PCA9685. Exclusively owns its bus handle; nothing else in
/// the process talks to the device.
pub struct Pca9685<B: I2cBus> {
    bus: B,
}

impl<B: I2cBus> Pca9685<B> {
    /// Take ownership of the bus and reset MODE1 to a known state.
    pub fn new(mut bus: B) -> Result<Self> {
        bus.write_register(Register::Mode1 as u8, 0x00)?;
        Ok(Self { bus })
    }

    /// Program the pre-scale register for `hz`. Called exactly once at
    /// startup, before any pulse writes.
    ///
    /// Datasheet sequence: the pre-scale register only accepts writes while
    /// the chip sleeps, and after waking the oscillator needs settling time
    /// before the restart bit may be set. Skipping the wait risks a
    /// corrupted PWM start.
    pub fn set_frequency(&mut self, hz: f64) -> Result<()> {
        let prescale = (OSCILLATOR_HZ / DUTY_RESOLUTION as f64 / hz - 1.0 + 0.5).floor() as u8;
        debug!("Setting PWM frequency to {} Hz (prescale {})", hz, prescale);

        let old_mode = self.bus.read_register(Register::Mode1 as u8)?;
        let sleep_mode = (old_mode & 0x7F) | MODE1_SLEEP;
        self.bus.write_register(Register::Mode1 as u8, sleep_mode)?;
        self.bus.write_register(Register::Prescale as u8, prescale)?;
        self.bus.write_register(Register::Mode1 as u8, old_mode)?;
        sleep(Duration::from_millis(5));
        self.bus
            .write_register(Register::Mode1 as u8, old_mode | MODE1_RESTART)
    }
}

impl<B: I2cBus> PulseDriver for Pca9685<B> {
    /// Convert a microsecond pulse width into the chip's fixed-point duty
    /// representation and write the (on, off) register pair for `channel`.
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        if channel >= NUM_CHANNELS {
            return Err(PwmError::BadChannel(channel));
        }
        if u32::from(pulse_us) >= PWM_PERIOD_US {
            return Err(PwmError::BadPulse(pulse_us));
        }

        let off = u32::from(pulse_us) * DUTY_RESOLUTION / PWM_PERIOD_US;
        let base = Register::Led0OnL as u8 + 4 * channel;

        debug!("channel {}: {}us -> {} counts", channel, pulse_us, off);

        self.bus.write_register(base, 0)?;
        self.bus.write_register(base + 1, 0)?;
        self.bus.write_register(base + 2, (off & 0xFF) as u8)?;
        self.bus.write_register(base + 3, (off >> 8) as u8)
    }
}

/// Linux I2C transport (Raspberry Pi and similar) via rppal.
#[cfg(feature = "rpi-hw")]
pub struct LinuxI2c {
    i2c: rppal::i2c::I2c,
}

#[cfg(feature = "rpi-hw")]
impl LinuxI2c {
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let mut i2c =
            rppal::i2c::I2c::with_bus(bus).map_err(|e| PwmError::Bus(e.to_string()))?;
        i2c.set_slave_address(address)
            .map_err(|e| PwmError::Bus(e.to_string()))?;
        Ok(Self { i2c })
    }
}

#[cfg(feature = "rpi-hw")]
impl I2cBus for LinuxI2c {
    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .smbus_write_byte(reg, value)
            .map_err(|e| PwmError::Bus(e.to_string()))
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        self.i2c
            .smbus_read_byte(reg)
            .map_err(|e| PwmError::Bus(e.to_string()))
    }
}
