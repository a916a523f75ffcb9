// High-level drive base interface
//
// Wraps the Open Interface bus behind the two commands the actuation loop
// actually issues: forward speed and turn-in-place speed. Each command
// fully replaces the previous motion, so commanding a turn implies zero
// forward speed and vice versa.

use std::thread::sleep;
use std::time::Duration;

use tracing::{info, warn};

use super::oi::{
    DriveError, OiBus, Opcode, MAX_VELOCITY_MMS, RADIUS_SPIN_CCW, RADIUS_SPIN_CW, RADIUS_STRAIGHT,
};

/// The OI needs a moment after a mode change before accepting commands.
const MODE_SETTLE_MS: u64 = 100;

pub struct DriveBase {
    bus: OiBus,
}

impl DriveBase {
    /// Open the serial link to the base controller.
    pub fn new(port: &str) -> Result<Self, DriveError> {
        info!("Opening drive base on {}", port);
        let bus = OiBus::open(port)?;
        Ok(Self { bus })
    }

    /// Put the base into Safe mode, ready for drive commands. Must be
    /// called before the first speed command. Runs at startup, before the
    /// control loops exist, so the blocking settle delay is acceptable.
    pub fn initialize(&mut self) -> Result<(), DriveError> {
        info!("Initializing drive base (Start -> Safe)");
        self.bus.opcode(Opcode::Start)?;
        sleep(Duration::from_millis(MODE_SETTLE_MS));
        self.bus.opcode(Opcode::Safe)?;
        sleep(Duration::from_millis(MODE_SETTLE_MS));
        Ok(())
    }

    /// Drive straight at `speed` mm/s (negative = backward).
    pub fn set_forward_speed(&mut self, speed: f64) -> Result<(), DriveError> {
        self.bus.drive(clamp_velocity(speed), RADIUS_STRAIGHT)
    }

    /// Spin in place at `speed` mm/s; the sign picks the direction
    /// (positive = clockwise, stick-right turns right).
    pub fn set_turn_speed(&mut self, speed: f64) -> Result<(), DriveError> {
        let radius = if speed >= 0.0 {
            RADIUS_SPIN_CW
        } else {
            RADIUS_SPIN_CCW
        };
        self.bus.drive(clamp_velocity(speed.abs()), radius)
    }

    /// Stop all wheel motion immediately.
    pub fn stop(&mut self) -> Result<(), DriveError> {
        info!("Stopping drive base");
        self.bus.drive(0, RADIUS_STRAIGHT)
    }

    /// Leave the OI entirely, releasing the base.
    pub fn power_down(&mut self) -> Result<(), DriveError> {
        self.bus.opcode(Opcode::Stop)
    }
}

impl Drop for DriveBase {
    fn drop(&mut self) {
        // Try to stop the wheels when the driver goes away (safety measure)
        if let Err(e) = self.stop() {
            warn!("Failed to stop drive base on drop: {}", e);
        }
    }
}

/// Round to whole mm/s and saturate at the protocol limit.
fn clamp_velocity(speed: f64) -> i16 {
    let limit = f64::from(MAX_VELOCITY_MMS);
    speed.clamp(-limit, limit).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_velocity_passes_in_range() {
        assert_eq!(clamp_velocity(320.0), 320);
        assert_eq!(clamp_velocity(-120.4), -120);
    }

    #[test]
    fn test_clamp_velocity_saturates() {
        assert_eq!(clamp_velocity(9000.0), MAX_VELOCITY_MMS);
        assert_eq!(clamp_velocity(-9000.0), -MAX_VELOCITY_MMS);
    }

    #[test]
    fn test_clamp_velocity_swallows_nan() {
        // A NaN never reaches here from the parser, but the cast must not
        // produce an out-of-range command either way.
        let v = clamp_velocity(f64::NAN);
        assert!(v.abs() <= MAX_VELOCITY_MMS);
    }
}
