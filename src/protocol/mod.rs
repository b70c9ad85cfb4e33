//! Protocol definitions for SDS011 communication.
//!
//! This module contains the low-level protocol types:
//! - Command codes and modes
//! - Frame encoding/decoding with checksum validation
//! - The stream scanner that recovers frames from raw bytes

pub mod command;
pub mod frame;
pub mod scanner;

pub use command::{CommandCode, Mode};
pub use frame::{Frame, MARKER, Reply, TAIL_MARKER, decode as decode_frame, encode_command};
pub use scanner::FrameScanner;
