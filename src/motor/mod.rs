// Drive base control module
//
// Provides:
// - Open Interface serial protocol implementation
// - High-level forward/turn speed API with stop-on-drop

mod driver;
pub mod oi;

pub use driver::DriveBase;
pub use oi::{DriveError, MAX_VELOCITY_MMS};
