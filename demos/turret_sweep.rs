// Turret sweep: range-of-motion check for the pan/tilt servos
//
// Walks each axis across its full travel and back, then re-homes. Run this
// before trusting live commands on a freshly assembled turret.
//
// Usage: cargo run --example turret_sweep -- [--sim]
// Hardware mode needs the rpi-hw feature:
//   cargo run --features rpi-hw --example turret_sweep
//
// Safety: the turret WILL move through its full range. Keep the linkage
// clear before confirming.

use std::io::{self, Write};

use rover_teleop_runtime::config::RuntimeConfig;
use rover_teleop_runtime::turret::{PulseDriver, SimPulseDriver, Turret};

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let sim = std::env::args().any(|a| a == "--sim") || !cfg!(feature = "rpi-hw");
    let config = RuntimeConfig::default();

    println!("Turret range-of-motion sweep");
    println!(
        "  pan:  channel {}, {}..{}us",
        config.pan.channel, config.pan.min_us, config.pan.max_us
    );
    println!(
        "  tilt: channel {}, {}..{}us",
        config.tilt.channel, config.tilt.min_us, config.tilt.max_us
    );
    println!("  mode: {}", if sim { "simulation" } else { "hardware" });
    println!();

    if !sim && !confirm("The turret will move through its FULL range. Is the linkage clear?") {
        println!("Aborted.");
        return Ok(());
    }

    let driver = pwm_driver(&config, sim)?;
    let mut turret = Turret::new(driver, &config)?;

    turret.sweep_test()?;
    println!("Sweep complete, turret re-homed.");

    Ok(())
}

fn pwm_driver(
    config: &RuntimeConfig,
    sim: bool,
) -> Result<Box<dyn PulseDriver>, Box<dyn std::error::Error>> {
    if sim {
        return Ok(Box::new(SimPulseDriver));
    }
    hardware_driver(config)
}

#[cfg(feature = "rpi-hw")]
fn hardware_driver(
    config: &RuntimeConfig,
) -> Result<Box<dyn PulseDriver>, Box<dyn std::error::Error>> {
    use rover_teleop_runtime::turret::pca9685::LinuxI2c;
    use rover_teleop_runtime::turret::{Pca9685, PWM_FREQUENCY_HZ};

    let bus = LinuxI2c::open(config.i2c_bus, config.i2c_address)?;
    let mut pwm = Pca9685::new(bus)?;
    pwm.set_frequency(PWM_FREQUENCY_HZ)?;
    Ok(Box::new(pwm))
}

#[cfg(not(feature = "rpi-hw"))]
fn hardware_driver(
    _config: &RuntimeConfig,
) -> Result<Box<dyn PulseDriver>, Box<dyn std::error::Error>> {
    use rover_teleop_runtime::turret::PwmError;
    Err(Box::new(PwmError::Unsupported))
}
