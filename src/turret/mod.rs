// Pan/tilt turret control
//
// Provides:
// - Bounded actuators with hard travel limits
// - PCA9685 register-level driver behind the PulseDriver trait
// - High-level turret API: scaled delta integration, push, park, sweep

pub mod actuator;
pub mod pca9685;

pub use actuator::BoundedActuator;
pub use pca9685::{I2cBus, Pca9685, PwmError, PWM_FREQUENCY_HZ};

use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{ConfigError, RuntimeConfig, SWEEP_STEP_DELAY_MS, SWEEP_STEP_US};

/// Capability the turret needs from a PWM board: set one channel's duty by
/// pulse width. Implemented by the PCA9685 driver and by [`SimPulseDriver`].
pub trait PulseDriver: Send {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<(), PwmError>;
}

/// Logs pulses instead of touching hardware. Used by `--sim` and tests.
pub struct SimPulseDriver;

impl PulseDriver for SimPulseDriver {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<(), PwmError> {
        debug!("sim pulse: channel {} <- {}us", channel, pulse_us);
        Ok(())
    }
}

/// Pan/tilt turret. Owns both actuators and the pulse driver; nothing else
/// mutates them.
pub struct Turret {
    driver: Box<dyn PulseDriver>,
    pan: BoundedActuator,
    tilt: BoundedActuator,
    step_divisor: f64,
}

impl Turret {
    pub fn new(driver: Box<dyn PulseDriver>, config: &RuntimeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            driver,
            pan: BoundedActuator::new("pan", &config.pan)?,
            tilt: BoundedActuator::new("tilt", &config.tilt)?,
            step_divisor: config.turret_divisor,
        })
    }

    /// Integrate one tick's worth of operator deltas and push the resulting
    /// positions. The raw deltas are scaled down by the step divisor so a
    /// held full deflection tracks at a controllable rate.
    pub fn update(&mut self, dx: f64, dy: f64) -> Result<(), PwmError> {
        self.pan.apply_delta(dx / self.step_divisor);
        self.tilt.apply_delta(dy / self.step_divisor);
        self.push()
    }

    /// Push both current positions to the PWM board.
    pub fn push(&mut self) -> Result<(), PwmError> {
        let pan_us = self.pan.current_us().round() as u16;
        let tilt_us = self.tilt.current_us().round() as u16;
        self.driver.set_pulse_us(self.pan.channel(), pan_us)?;
        self.driver.set_pulse_us(self.tilt.channel(), tilt_us)
    }

    /// Drive both axes to their rest positions.
    pub fn park(&mut self) -> Result<(), PwmError> {
        self.pan.home();
        self.tilt.home();
        self.push()
    }

    /// Range-of-motion self-test: walk each axis min -> max -> min, then
    /// re-home. Startup diagnostic only; runs before the control loops start,
    /// so the blocking per-step delay is fine here.
    pub fn sweep_test(&mut self) -> Result<(), PwmError> {
        sweep_axis(self.driver.as_mut(), &mut self.pan)?;
        sweep_axis(self.driver.as_mut(), &mut self.tilt)?;
        self.park()
    }

    pub fn pan(&self) -> &BoundedActuator {
        &self.pan
    }

    pub fn tilt(&self) -> &BoundedActuator {
        &self.tilt
    }
}

fn sweep_axis(
    driver: &mut dyn PulseDriver,
    actuator: &mut BoundedActuator,
) -> Result<(), PwmError> {
    info!(
        "Sweeping {} (channel {}, {}..{}us)",
        actuator.name(),
        actuator.channel(),
        actuator.min_us(),
        actuator.max_us()
    );
    for pos in actuator.sweep_path(SWEEP_STEP_US) {
        actuator.set_absolute(pos);
        driver.set_pulse_us(actuator.channel(), actuator.current_us().round() as u16)?;
        sleep(Duration::from_millis(SWEEP_STEP_DELAY_MS));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    /// Forwards pulses to a channel so tests can observe what was pushed.
    struct RecordingDriver {
        tx: mpsc::Sender<(u8, u16)>,
    }

    impl PulseDriver for RecordingDriver {
        fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<(), PwmError> {
            self.tx.send((channel, pulse_us)).ok();
            Ok(())
        }
    }

    fn recording_turret() -> (Turret, mpsc::Receiver<(u8, u16)>) {
        let (tx, rx) = mpsc::channel();
        let turret = Turret::new(
            Box::new(RecordingDriver { tx }),
            &RuntimeConfig::default(),
        )
        .unwrap();
        (turret, rx)
    }

    #[test]
    fn test_update_scales_deltas_by_divisor() {
        let (mut turret, rx) = recording_turret();
        turret.update(30.0, -50.0).unwrap();

        // defaults 1440/2280, divisor 10
        assert_eq!(rx.recv().unwrap(), (6, 1443));
        assert_eq!(rx.recv().unwrap(), (7, 2275));
    }

    #[test]
    fn test_held_deflection_walks_to_limit_and_clamps() {
        let (mut turret, _rx) = recording_turret();
        for _ in 0..10_000 {
            turret.update(10.0, 10.0).unwrap();
        }
        assert_eq!(turret.pan().current_us(), turret.pan().max_us());
        assert_eq!(turret.tilt().current_us(), turret.tilt().max_us());
    }

    #[test]
    fn test_park_pushes_defaults() {
        let (mut turret, rx) = recording_turret();
        turret.update(500.0, 500.0).unwrap();
        while rx.try_recv().is_ok() {}

        turret.park().unwrap();
        assert_eq!(rx.recv().unwrap(), (6, 1440));
        assert_eq!(rx.recv().unwrap(), (7, 2280));
    }

    #[test]
    fn test_zero_delta_holds_position() {
        let (mut turret, rx) = recording_turret();
        turret.update(25.0, 0.0).unwrap();
        let first: Vec<_> = vec![rx.recv().unwrap(), rx.recv().unwrap()];
        turret.update(0.0, 0.0).unwrap();
        let second: Vec<_> = vec![rx.recv().unwrap(), rx.recv().unwrap()];
        assert_eq!(first, second);
    }
}
