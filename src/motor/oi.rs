// iRobot Open Interface serial protocol
//
// Command stream of single-byte opcodes followed by big-endian parameters:
//   [137, vel_hi, vel_lo, rad_hi, rad_lo]
// The OI never acknowledges commands, so every write is fire-and-forget.

use serialport::{self, SerialPort};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

/// Default serial configuration for the drive base
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Hard OI velocity limit in mm/s
pub const MAX_VELOCITY_MMS: i16 = 500;

/// Special Drive radii
pub const RADIUS_STRAIGHT: i16 = 0x7FFF;
pub const RADIUS_SPIN_CW: i16 = -1;
pub const RADIUS_SPIN_CCW: i16 = 1;

/// Instruction set (subset used by the runtime)
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Opcode {
    Start = 128,
    Safe = 131,
    Full = 132,
    Drive = 137,
    Stop = 173,
}

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriveError>;

/// Serial connection to the drive base controller.
pub struct OiBus {
    port: Box<dyn SerialPort>,
}

impl OiBus {
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a bare opcode (Start, Safe, Stop, ...).
    pub fn opcode(&mut self, op: Opcode) -> Result<()> {
        debug!("OI opcode {:?}", op);
        self.send(&[op as u8])
    }

    /// Drive command: velocity in mm/s, turn radius in mm (with the special
    /// straight/spin values).
    pub fn drive(&mut self, velocity_mms: i16, radius_mm: i16) -> Result<()> {
        debug!("OI drive: velocity={} radius={}", velocity_mms, radius_mm);
        self.send(&drive_packet(velocity_mms, radius_mm))
    }
}

fn drive_packet(velocity_mms: i16, radius_mm: i16) -> [u8; 5] {
    let v = velocity_mms.to_be_bytes();
    let r = radius_mm.to_be_bytes();
    [Opcode::Drive as u8, v[0], v[1], r[0], r[1]]
}
