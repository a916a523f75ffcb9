// Keyboard teleop client: WASD drive, IJKL turret, P autopilot, R/F speed, Q quit
//
// Stands in for the joystick-side operator: synthesizes calibrated axis
// values and streams ASCII frames to the runtime at a fixed rate.
//
// Usage: cargo run --example cmd_client -- [host:port]

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::Write;
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tracing::info;

use rover_teleop_runtime::messages::ControlFrame;

const AXIS_LEVELS: [f64; 3] = [0.3, 0.6, 1.0];
const TURRET_DELTAS: [f64; 3] = [1.0, 3.0, 6.0];
const INPUT_TIMEOUT_MS: u64 = 150; // Reset axes after this much time with no input
const SEND_PERIOD_MS: u64 = 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:20000".to_string());

    info!("Connecting to {}...", addr);
    let mut stream = TcpStream::connect(&addr)?;
    info!("Controls: WASD=drive, IJKL=turret, P=autopilot, R/F=speed, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&mut stream);
    disable_raw_mode()?;

    result
}

fn run_teleop(stream: &mut TcpStream) -> Result<(), Box<dyn std::error::Error>> {
    let mut level_idx: usize = 0;

    // Persistent operator state
    let mut frame = ControlFrame::NEUTRAL;
    let mut last_input = Instant::now();

    loop {
        if event::poll(Duration::from_millis(SEND_PERIOD_MS))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let axis = AXIS_LEVELS[level_idx];
                let delta = TURRET_DELTAS[level_idx];

                match code {
                    // Drive - update axis and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        frame.drive_y = axis;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        frame.drive_y = -axis;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        frame.drive_x = -axis;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        frame.drive_x = axis;
                        last_input = Instant::now();
                    }

                    // Turret
                    KeyCode::Char('i') if pressed => {
                        frame.turret_dy = delta;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('k') if pressed => {
                        frame.turret_dy = -delta;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('j') if pressed => {
                        frame.turret_dx = -delta;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('l') if pressed => {
                        frame.turret_dx = delta;
                        last_input = Instant::now();
                    }

                    // Autopilot flag (transmitted, unused by the runtime)
                    KeyCode::Char('p') if pressed => {
                        frame.autopilot = !frame.autopilot;
                        info!("Autopilot flag: {}", frame.autopilot);
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        level_idx = (level_idx + 1).min(2);
                        print_level(level_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        level_idx = level_idx.saturating_sub(1);
                        print_level(level_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Center the stick if no input for INPUT_TIMEOUT_MS
        if last_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            let autopilot = frame.autopilot;
            frame = ControlFrame::NEUTRAL;
            frame.autopilot = autopilot;
        }

        // Always stream at the fixed rate
        stream.write_all(frame.encode().as_bytes())?;
        stream.flush()?;
    }

    Ok(())
}

fn print_level(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
