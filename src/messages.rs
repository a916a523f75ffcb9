// Wire types and codec for the operator link
//
// One ASCII frame per logical command, terminated by '*':
//   "+0.42 -0.07 0 +3.00 -1.50*"
// Fields in fixed order: drive_x drive_y autopilot turret_dx turret_dy.
// The link carries no length prefix and no handshake, so frames may arrive
// torn across reads or concatenated with garbage; the decoder is
// responsible for reassembly and for dropping malformed chunks.

use tracing::warn;

/// Frame terminator on the wire.
pub const FRAME_TERMINATOR: u8 = b'*';

/// Pending bytes kept while waiting for a terminator. A sender that never
/// terminates a frame gets its backlog dropped instead of growing the buffer.
const MAX_PENDING_BYTES: usize = 1024;

/// Decoded operator intent. A new frame fully replaces the previous one;
/// no history is kept anywhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlFrame {
    /// Turn axis, [-1, 1].
    pub drive_x: f64,
    /// Forward/backward axis, [-1, 1].
    pub drive_y: f64,
    /// Transmitted by the operator but not acted on by the runtime.
    pub autopilot: bool,
    /// Horizontal turret delta, unclamped (the actuator clamps).
    pub turret_dx: f64,
    /// Vertical turret delta, unclamped.
    pub turret_dy: f64,
}

impl ControlFrame {
    /// All-stop frame: installed before the first message arrives and
    /// re-installed when the operator link drops.
    pub const NEUTRAL: Self = Self {
        drive_x: 0.0,
        drive_y: 0.0,
        autopilot: false,
        turret_dx: 0.0,
        turret_dy: 0.0,
    };

    /// Encode with two decimal places and explicit sign, terminator included.
    pub fn encode(&self) -> String {
        format!(
            "{:+.2} {:+.2} {} {:+.2} {:+.2}*",
            self.drive_x,
            self.drive_y,
            u8::from(self.autopilot),
            self.turret_dx,
            self.turret_dy,
        )
    }

    /// Parse one terminator-stripped chunk.
    pub fn parse(chunk: &str) -> Result<Self, FrameError> {
        let tokens: Vec<&str> = chunk.split_whitespace().collect();
        if tokens.len() != 5 {
            return Err(FrameError::FieldCount(tokens.len()));
        }

        let drive_x = parse_float(tokens[0])?;
        let drive_y = parse_float(tokens[1])?;
        let autopilot = match tokens[2] {
            "0" => false,
            "1" => true,
            other => return Err(FrameError::BadFlag(other.to_string())),
        };
        let turret_dx = parse_float(tokens[3])?;
        let turret_dy = parse_float(tokens[4])?;

        Ok(Self {
            // The sender is untrusted; hold the axes to their documented range.
            drive_x: drive_x.clamp(-1.0, 1.0),
            drive_y: drive_y.clamp(-1.0, 1.0),
            autopilot,
            turret_dx,
            turret_dy,
        })
    }
}

fn parse_float(token: &str) -> Result<f64, FrameError> {
    let value: f64 = token
        .parse()
        .map_err(|_| FrameError::BadFloat(token.to_string()))?;
    if !value.is_finite() {
        return Err(FrameError::BadFloat(token.to_string()));
    }
    Ok(value)
}

/// Why a chunk was rejected.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid float field {0:?}")]
    BadFloat(String),

    #[error("autopilot flag must be 0 or 1, got {0:?}")]
    BadFlag(String),
}

/// Incremental frame decoder.
///
/// Feed it raw bytes as they come off the socket; it splits on the
/// terminator, keeps the partial trailing chunk for the next read, and
/// silently survives malformed chunks (they are logged and dropped).
#[derive(Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a read's worth of bytes, returning every complete,
    /// well-formed frame it finished.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ControlFrame> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self
            .pending
            .iter()
            .position(|&b| b == FRAME_TERMINATOR)
        {
            let chunk: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&chunk[..chunk.len() - 1]);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            match ControlFrame::parse(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("Dropping malformed frame {:?}: {}", trimmed, e),
            }
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            warn!(
                "No terminator in {} buffered bytes, dropping backlog",
                self.pending.len()
            );
            self.pending.clear();
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_format() {
        let frame = ControlFrame {
            drive_x: 0.42,
            drive_y: -0.07,
            autopilot: false,
            turret_dx: 3.0,
            turret_dy: -1.5,
        };
        assert_eq!(frame.encode(), "+0.42 -0.07 0 +3.00 -1.50*");
    }

    #[test]
    fn test_round_trip_two_decimals() {
        let frame = ControlFrame {
            drive_x: -0.13,
            drive_y: 0.99,
            autopilot: true,
            turret_dx: -12.25,
            turret_dy: 0.5,
        };
        let encoded = frame.encode();
        let decoded = ControlFrame::parse(encoded.trim_end_matches('*')).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(matches!(
            ControlFrame::parse("+0.1 +0.2 0 +1.0"),
            Err(FrameError::FieldCount(4))
        ));
        assert!(matches!(
            ControlFrame::parse("+0.1 +0.2 0 +1.0 +2.0 +3.0"),
            Err(FrameError::FieldCount(6))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_fields() {
        assert!(matches!(
            ControlFrame::parse("abc +0.2 0 +1.0 +2.0"),
            Err(FrameError::BadFloat(_))
        ));
        assert!(matches!(
            ControlFrame::parse("+0.1 +0.2 2 +1.0 +2.0"),
            Err(FrameError::BadFlag(_))
        ));
        assert!(matches!(
            ControlFrame::parse("+0.1 nan 0 +1.0 +2.0"),
            Err(FrameError::BadFloat(_))
        ));
    }

    #[test]
    fn test_parse_clamps_drive_axes() {
        let frame = ControlFrame::parse("+9.00 -9.00 0 +30.0 -30.0").unwrap();
        assert_eq!(frame.drive_x, 1.0);
        assert_eq!(frame.drive_y, -1.0);
        // Turret deltas stay unclamped; the actuator enforces its own range.
        assert_eq!(frame.turret_dx, 30.0);
    }

    #[test]
    fn test_decoder_malformed_frames_are_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"+0.1 +0.2 0 +1.0 +0.5*garbage*+0.3 -0.3 1 +0.0 +0.0*");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].turret_dx, 1.0);
        assert!(frames[1].autopilot);
        assert_eq!(frames[1].drive_y, -0.3);
    }

    #[test]
    fn test_decoder_survives_truncated_and_garbage_chunks() {
        // "+0.1 +0.2 0 +1" is short one field, "garbage" parses as nothing;
        // only the final chunk is a frame. Neither bad chunk may stall the
        // decoder or leak into the output.
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"+0.1 +0.2 0 +1*garbage*+0.3 -0.3 1 +0.0 +0.0*");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].drive_x, 0.3);
    }

    #[test]
    fn test_decoder_reassembles_split_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"+0.1 +0.2 0 +1.0 +").is_empty());
        let frames = decoder.feed(b"2.0*");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].turret_dy, 2.0);
    }

    #[test]
    fn test_decoder_handles_empty_chunks() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"**  *+0.1 +0.2 0 +0.0 +0.0*");
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_decoder_recovers_after_backlog_drop() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&[b'x'; 2048]).is_empty());
        let frames = decoder.feed(b"+0.1 +0.2 0 +0.0 +0.0*");
        assert_eq!(frames.len(), 1);
    }
}
