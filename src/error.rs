//! Error types for the sds011 library.

use thiserror::Error;

/// The main error type for sds011 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The request was discarded before a reply confirmed it.
    ///
    /// A reply matching a later command arrived first; the protocol allows
    /// only one command in flight, so everything ahead of the match is
    /// presumed superseded. Also returned when the engine shuts down while
    /// the request is still queued.
    #[error("request superseded before a reply arrived")]
    Superseded,

    /// The engine task is no longer running.
    #[error("engine shut down")]
    Shutdown,

    /// Cycle interval out of the device's supported range.
    #[error("cycle interval {minutes} min out of range (0 to 30)")]
    InvalidCycleInterval { minutes: u8 },
}

/// Frame-specific errors.
///
/// These occur while scanning the receive stream. They are recoverable:
/// the scanner resynchronizes and parsing resumes with the next frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Checksum byte disagrees with the sum over the frame body.
    #[error("checksum mismatch: computed {computed:#04x}, frame carries {found:#04x}")]
    ChecksumMismatch { computed: u8, found: u8 },

    /// The byte at the tail-marker offset is not the tail marker.
    #[error("framing desync: expected tail marker, found {found:#04x}")]
    Desync { found: u8 },
}

/// Result type alias for sds011 operations.
pub type Result<T> = std::result::Result<T, Error>;
