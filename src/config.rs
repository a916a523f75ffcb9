// Runtime configuration: network endpoint, loop cadence, speed ceiling,
// turret geometry. Loaded once at startup from an optional JSON file plus
// CLI overrides, validated before any hardware or socket is touched, and
// immutable afterwards.

use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

// Actuation loop period
pub const DEFAULT_TICK_MS: u64 = 10;

// Ceiling on drive speed, in the motor abstraction's mm/s units.
// Kept below the Open Interface hard limit of 500 mm/s.
pub const DEFAULT_MAX_SPEED: f64 = 400.0;

// A held joystick deflection of 1.0 walks the turret by 1/divisor us per tick.
pub const DEFAULT_TURRET_DIVISOR: f64 = 10.0;

// Serial port for the drive base
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

// PCA9685 location
pub const DEFAULT_I2C_BUS: u8 = 1;
pub const DEFAULT_I2C_ADDRESS: u16 = 0x40;

// Range-of-motion sweep parameters
pub const SWEEP_STEP_US: f64 = 10.0;
pub const SWEEP_STEP_DELAY_MS: u64 = 20;

/// One turret axis: PWM channel plus its travel limits in microseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ServoConfig {
    pub channel: u8,
    pub min_us: f64,
    pub max_us: f64,
    pub default_us: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Endpoint the operator connects to.
    pub listen: SocketAddr,
    /// Actuation loop period in milliseconds.
    pub tick_ms: u64,
    /// Maximum drive speed magnitude.
    pub max_speed: f64,
    /// Divisor applied to turret deltas before integration.
    pub turret_divisor: f64,
    /// Serial port of the drive base.
    pub serial_port: String,
    pub i2c_bus: u8,
    pub i2c_address: u16,
    /// Horizontal turret axis.
    pub pan: ServoConfig,
    /// Vertical turret axis.
    pub tilt: ServoConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 20000)),
            tick_ms: DEFAULT_TICK_MS,
            max_speed: DEFAULT_MAX_SPEED,
            turret_divisor: DEFAULT_TURRET_DIVISOR,
            serial_port: DEFAULT_SERIAL_PORT.to_string(),
            i2c_bus: DEFAULT_I2C_BUS,
            i2c_address: DEFAULT_I2C_ADDRESS,
            pan: ServoConfig {
                channel: 6,
                min_us: 620.0,
                max_us: 2410.0,
                default_us: 1440.0,
            },
            tilt: ServoConfig {
                channel: 7,
                min_us: 1340.0,
                max_us: 2490.0,
                default_us: 2280.0,
            },
        }
    }
}

impl RuntimeConfig {
    /// Load from a JSON file. Missing fields fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(file).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations the runtime cannot operate with. Actuator
    /// ranges get their own check when the actuators are constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.max_speed <= 0.0 || !self.max_speed.is_finite() {
            return Err(ConfigError::BadMaxSpeed(self.max_speed));
        }
        if self.turret_divisor <= 0.0 || !self.turret_divisor.is_finite() {
            return Err(ConfigError::BadDivisor(self.turret_divisor));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{name}: invalid travel range [{min_us}, {max_us}]")]
    InvalidRange {
        name: String,
        min_us: f64,
        max_us: f64,
    },

    #[error("{name}: default {default_us}us outside [{min_us}, {max_us}]")]
    DefaultOutOfRange {
        name: String,
        default_us: f64,
        min_us: f64,
        max_us: f64,
    },

    #[error("tick period must be non-zero")]
    ZeroTick,

    #[error("max speed must be a positive finite value, got {0}")]
    BadMaxSpeed(f64),

    #[error("turret divisor must be a positive finite value, got {0}")]
    BadDivisor(f64),
}
