//! Frame encoding and decoding for the SDS011 protocol.
//!
//! Command frames sent to the sensor are 19 bytes:
//! ```text
//! ┌──────┬──────┬─────┬──────┬──────┬───────────┬───────────┬───────┬──────┐
//! │ 0xAA │ 0xB4 │ cmd │ mode │ data │ 10 × 0x00 │ 0xFF 0xFF │ cksum │ 0xAB │
//! └──────┴──────┴─────┴──────┴──────┴───────────┴───────────┴───────┴──────┘
//! ```
//! The checksum is the 8-bit sum of all bytes from `cmd` through the second
//! reserved `0xFF`, inclusive.
//!
//! Frames received from the sensor are 10 bytes:
//! ```text
//! ┌──────┬──────┬─────────────────┬───────┬──────┐
//! │ 0xAA │ type │ payload (6)     │ cksum │ 0xAB │
//! └──────┴──────┴─────────────────┴───────┴──────┘
//! ```
//! where `type` is `0xC5` for a command reply and `0xC0` for an unsolicited
//! sample broadcast. The checksum is the 8-bit sum of the type byte and the
//! six payload bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::command::{CommandCode, Mode};
use crate::types::Sample;

/// Frame start marker.
pub const MARKER: u8 = 0xAA;

/// Frame tail marker.
pub const TAIL_MARKER: u8 = 0xAB;

/// Selector byte for frames sent to the sensor.
pub const SEND_SELECTOR: u8 = 0xB4;

/// Type byte of a command reply frame.
pub const REPLY_TYPE: u8 = 0xC5;

/// Type byte of a sample broadcast frame.
pub const SAMPLE_TYPE: u8 = 0xC0;

/// Total length of an encoded command frame.
pub const COMMAND_FRAME_LEN: usize = 19;

/// Length of a received frame body after the start marker:
/// type byte, 6 payload bytes, checksum, tail marker.
pub const BODY_LEN: usize = 9;

/// Broadcast device id (addresses every sensor on the line).
const DEVICE_ID_BROADCAST: [u8; 2] = [0xFF, 0xFF];

/// 8-bit checksum: byte sum modulo 256.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Encodes a command into a complete wire frame.
///
/// The wire frame always carries a mode byte; whether the command is
/// correlated by mode is decided by the multiplexer, not the codec.
#[must_use]
pub fn encode_command(command: CommandCode, mode: Mode, payload: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(COMMAND_FRAME_LEN);
    buf.put_u8(MARKER);
    buf.put_u8(SEND_SELECTOR);
    buf.put_u8(command.into());
    buf.put_u8(mode.into());
    buf.put_u8(payload);
    buf.put_bytes(0, 10);
    buf.put_slice(&DEVICE_ID_BROADCAST);
    buf.put_u8(checksum(&buf[2..]));
    buf.put_u8(TAIL_MARKER);
    buf.freeze()
}

/// A validated frame received from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    /// Confirmation of a previously sent command.
    Reply(Reply),
    /// Unsolicited particulate reading broadcast.
    Sample(Sample),
    /// Frame with an unrecognized type byte; logged and ignored.
    Unknown {
        /// The unrecognized type byte.
        kind: u8,
        /// The raw payload bytes.
        payload: [u8; 6],
    },
}

/// Payload of a reply frame: the echoed command, its mode, and result data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// The six payload bytes following the type byte.
    pub payload: [u8; 6],
}

impl Reply {
    /// The echoed command code of the confirmed request.
    #[must_use]
    pub const fn command(&self) -> u8 {
        self.payload[0]
    }

    /// The echoed mode byte of the confirmed request.
    #[must_use]
    pub const fn mode(&self) -> u8 {
        self.payload[1]
    }

    /// The result value byte for get/set replies.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.payload[2]
    }
}

/// Decodes and validates a frame body.
///
/// `body` is the [`BODY_LEN`] bytes following a start marker; the caller has
/// already located the marker and verified the tail-marker position. Decoding
/// is pure and performs no I/O.
///
/// # Errors
///
/// Returns [`FrameError::ChecksumMismatch`] if the checksum byte disagrees
/// with the sum over the type and payload bytes; such a frame is never
/// handed to the multiplexer.
pub fn decode(body: &[u8]) -> Result<Frame, FrameError> {
    debug_assert_eq!(body.len(), BODY_LEN);

    let computed = checksum(&body[..7]);
    if computed != body[7] {
        return Err(FrameError::ChecksumMismatch {
            computed,
            found: body[7],
        });
    }

    let mut payload = [0u8; 6];
    payload.copy_from_slice(&body[1..7]);

    Ok(match body[0] {
        REPLY_TYPE => Frame::Reply(Reply { payload }),
        SAMPLE_TYPE => Frame::Sample(Sample::from_payload(&payload)),
        kind => Frame::Unknown { kind, payload },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a valid frame body: type + payload + checksum + tail.
    fn body(kind: u8, payload: [u8; 6]) -> [u8; BODY_LEN] {
        let mut body = [0u8; BODY_LEN];
        body[0] = kind;
        body[1..7].copy_from_slice(&payload);
        body[7] = checksum(&body[..7]);
        body[8] = TAIL_MARKER;
        body
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode_command(CommandCode::Cycle, Mode::Set, 5);

        assert_eq!(frame.len(), COMMAND_FRAME_LEN);
        assert_eq!(frame[0], MARKER);
        assert_eq!(frame[1], SEND_SELECTOR);
        assert_eq!(frame[2], 8); // Cycle
        assert_eq!(frame[3], 1); // Set
        assert_eq!(frame[4], 5);
        assert!(frame[5..15].iter().all(|&b| b == 0));
        assert_eq!(&frame[15..17], &[0xFF, 0xFF]);
        assert_eq!(frame[17], checksum(&frame[2..17]));
        assert_eq!(frame[18], TAIL_MARKER);
    }

    #[test]
    fn test_encode_checksum_value() {
        // Firmware query: 7 + 0 + 0 + zeros + 0xFF + 0xFF = 0x205 -> 0x05
        let frame = encode_command(CommandCode::Firmware, Mode::Get, 0);
        assert_eq!(frame[17], 0x05);
    }

    #[test]
    fn test_decode_reply() {
        let body = body(REPLY_TYPE, [6, 1, 1, 0, 0xAB, 0xCD]);
        let frame = decode(&body).unwrap();

        let Frame::Reply(reply) = frame else {
            panic!("expected reply, got {frame:?}");
        };
        assert_eq!(reply.command(), 6);
        assert_eq!(reply.mode(), 1);
        assert_eq!(reply.value(), 1);
    }

    #[test]
    fn test_decode_sample() {
        let body = body(SAMPLE_TYPE, [0x0A, 0x00, 0x14, 0x00, 0xAB, 0xCD]);
        let frame = decode(&body).unwrap();

        let Frame::Sample(sample) = frame else {
            panic!("expected sample, got {frame:?}");
        };
        assert!((sample.pm2_5 - 1.0).abs() < f32::EPSILON);
        assert!((sample.pm10 - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_unknown_type() {
        let body = body(0xC7, [1, 2, 3, 4, 5, 6]);
        let frame = decode(&body).unwrap();
        assert!(matches!(frame, Frame::Unknown { kind: 0xC7, .. }));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut body = body(SAMPLE_TYPE, [0x0A, 0x00, 0x14, 0x00, 0xAB, 0xCD]);
        body[7] = body[7].wrapping_add(1);

        let err = decode(&body).unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0xFF, 0x02]), 0x00);
    }
}
