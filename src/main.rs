use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rover_teleop_runtime::config::RuntimeConfig;
use rover_teleop_runtime::motor::DriveBase;
use rover_teleop_runtime::runtime::{self, Runtime};
use rover_teleop_runtime::turret::{PulseDriver, SimPulseDriver, Turret};

#[derive(Parser)]
#[command(name = "rover-teleop-runtime", about = "Teleoperation runtime for the rover base and turret")]
struct Args {
    /// JSON config file; missing fields fall back to built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the operator listen endpoint
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override the drive base serial port
    #[arg(long)]
    serial_port: Option<String>,

    /// Run without hardware: actuation is logged instead of written
    #[arg(long)]
    sim: bool,

    /// Run the turret range-of-motion sweep before accepting commands
    #[arg(long)]
    sweep: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(port) = args.serial_port {
        config.serial_port = port;
    }
    config.validate()?;

    let turret = Turret::new(pwm_driver(&config, args.sim)?, &config)?;

    let drive = if args.sim {
        info!("Simulation mode: drive commands will be logged only");
        None
    } else {
        let mut drive = DriveBase::new(&config.serial_port)?;
        drive.initialize()?;
        Some(drive)
    };

    let mut runtime = Runtime::new(turret, drive, config.max_speed);

    if args.sweep {
        info!("Running turret range-of-motion sweep");
        runtime.sweep_test()?;
    }

    // Known physical state before the first operator command.
    runtime.home()?;
    info!("Actuators homed to rest positions");

    runtime::run(&config, runtime).await
}

fn pwm_driver(
    config: &RuntimeConfig,
    sim: bool,
) -> Result<Box<dyn PulseDriver>, Box<dyn Error + Send + Sync>> {
    if sim {
        return Ok(Box::new(SimPulseDriver));
    }
    hardware_pwm_driver(config)
}

#[cfg(feature = "rpi-hw")]
fn hardware_pwm_driver(
    config: &RuntimeConfig,
) -> Result<Box<dyn PulseDriver>, Box<dyn Error + Send + Sync>> {
    use rover_teleop_runtime::turret::pca9685::LinuxI2c;
    use rover_teleop_runtime::turret::{Pca9685, PWM_FREQUENCY_HZ};

    let bus = LinuxI2c::open(config.i2c_bus, config.i2c_address)?;
    let mut pwm = Pca9685::new(bus)?;
    pwm.set_frequency(PWM_FREQUENCY_HZ)?;
    Ok(Box::new(pwm))
}

#[cfg(not(feature = "rpi-hw"))]
fn hardware_pwm_driver(
    _config: &RuntimeConfig,
) -> Result<Box<dyn PulseDriver>, Box<dyn Error + Send + Sync>> {
    Err(Box::new(rover_teleop_runtime::turret::PwmError::Unsupported))
}
