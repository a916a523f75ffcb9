// Fixed-cadence actuation loop
//
// Reads the latest operator frame once per tick, arbitrates the drive axes,
// integrates the turret deltas, and pushes both to hardware. The loop never
// waits on the network: a missing frame means the last one is re-applied,
// and a flood of frames never makes a tick run early. On every exit path
// the actuators are parked before the hardware handles are released.

use std::error::Error;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::channel;
use crate::config::RuntimeConfig;
use crate::messages::ControlFrame;
use crate::motor::DriveBase;
use crate::turret::{PwmError, Turret};

/// One tick's drive decision. The arbitration is deliberately exclusive:
/// whichever axis has the larger magnitude wins the tick outright, and the
/// other contributes nothing. Each command fully replaces the previous
/// motion at the motor, so the losing axis is implicitly zeroed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCommand {
    Turn(f64),
    Forward(f64),
}

impl DriveCommand {
    pub fn from_frame(frame: &ControlFrame, max_speed: f64) -> Self {
        if frame.drive_x.abs() > frame.drive_y.abs() {
            DriveCommand::Turn(max_speed * frame.drive_x)
        } else {
            DriveCommand::Forward(max_speed * frame.drive_y)
        }
    }
}

pub struct Runtime {
    turret: Turret,
    drive: Option<DriveBase>,
    max_speed: f64,
}

impl Runtime {
    /// `drive` is `None` in simulation: drive commands are computed and
    /// logged but go nowhere.
    pub fn new(turret: Turret, drive: Option<DriveBase>, max_speed: f64) -> Self {
        Self {
            turret,
            drive,
            max_speed,
        }
    }

    /// Apply one frame to the actuators.
    ///
    /// A drive write failure skips that tick's drive actuation and the loop
    /// carries on. A PWM failure is fatal: the turret channel can no longer
    /// be verified, so the error propagates and triggers park-and-exit.
    fn tick(&mut self, frame: &ControlFrame) -> Result<(), PwmError> {
        let command = DriveCommand::from_frame(frame, self.max_speed);
        if let Some(drive) = self.drive.as_mut() {
            let result = match command {
                DriveCommand::Turn(speed) => drive.set_turn_speed(speed),
                DriveCommand::Forward(speed) => drive.set_forward_speed(speed),
            };
            if let Err(e) = result {
                warn!("Drive write failed, skipping this tick: {}", e);
            }
        }

        self.turret.update(frame.turret_dx, frame.turret_dy)
    }

    /// Drive everything to its neutral position. Best effort: failures are
    /// logged, not propagated, since this already runs on the way out.
    fn park(&mut self) {
        if let Err(e) = self.turret.park() {
            warn!("Failed to park turret: {}", e);
        }
        if let Some(drive) = self.drive.as_mut() {
            if let Err(e) = drive.stop() {
                warn!("Failed to stop drive base: {}", e);
            }
        }
    }

    /// Startup homing: push the rest positions so the physical state matches
    /// the actuator state before the first command. Fatal if it fails.
    pub fn home(&mut self) -> Result<(), PwmError> {
        self.turret.park()
    }

    /// Run the turret range-of-motion sweep.
    pub fn sweep_test(&mut self) -> Result<(), PwmError> {
        self.turret.sweep_test()
    }
}

pub async fn run(
    config: &RuntimeConfig,
    mut runtime: Runtime,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(config.listen).await?;
    info!("Waiting for an operator on {}", config.listen);

    let (tx, rx) = watch::channel(ControlFrame::NEUTRAL);
    let channel_task = tokio::spawn(channel::serve(listener, tx));

    let mut tick = interval(Duration::from_millis(config.tick_ms));
    // A late tick is skipped rather than replayed in a burst; the cadence
    // stays aligned to the configured period.
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Actuation loop started: {}ms tick, max speed {}",
        config.tick_ms, config.max_speed
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = tick.tick() => {
                // Snapshot read: always complete, never torn, possibly stale.
                let frame = *rx.borrow();
                if let Err(e) = runtime.tick(&frame) {
                    error!("Actuation failed: {}", e);
                    break Err(e.into());
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break Ok(());
            }
        }
    };

    channel_task.abort();
    runtime.park();
    info!("Actuators parked, runtime stopped");
    result
}
