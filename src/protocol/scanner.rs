//! Stream framer: recovers validated frames from a raw byte stream.
//!
//! The serial line delivers bytes in arbitrary fragments, possibly with
//! noise, truncated frames, or corruption in between. [`FrameScanner`]
//! buffers incoming bytes and runs a two-state machine over them:
//!
//! - **Seeking**: no start marker located yet. Bytes up to and including a
//!   located marker are discarded as noise.
//! - **Framing**: a marker was consumed; wait until a full frame body is
//!   buffered, verify the tail marker position, then validate and decode.
//!
//! The state transition is deterministic per buffer content. Resynchronization
//! after corruption never re-scans a consumed marker, so a run of marker
//! bytes cannot livelock the scanner.

use bytes::{Buf, BytesMut};

use crate::error::FrameError;
use crate::protocol::frame::{self, BODY_LEN, Frame, MARKER, TAIL_MARKER};

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Searching the buffer for a start marker.
    Seeking,
    /// Marker consumed; waiting for a complete frame body.
    Framing,
}

/// Incremental frame scanner over a growing receive buffer.
#[derive(Debug)]
pub struct FrameScanner {
    buf: BytesMut,
    state: ScanState,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScanner {
    /// Creates a new scanner in the seeking state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            state: ScanState::Seeking,
        }
    }

    /// Appends freshly read bytes to the receive buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extracts the next validated frame from the buffer.
    ///
    /// Returns `Ok(Some(frame))` for a complete validated frame and
    /// `Ok(None)` once the buffered bytes cannot yield another frame (more
    /// data is needed). Call in a loop after each [`feed`](Self::feed) until
    /// `Ok(None)`: the buffer must be fully drained of complete frames
    /// before the next transport read is issued.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] when a candidate frame is dropped (missing
    /// tail marker or checksum mismatch). The scanner has already
    /// resynchronized; calling again resumes scanning.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        loop {
            match self.state {
                ScanState::Seeking => {
                    let Some(pos) = self.buf.iter().position(|&b| b == MARKER) else {
                        return Ok(None);
                    };
                    // Noise before the marker, then the marker itself.
                    self.buf.advance(pos + 1);
                    self.state = ScanState::Framing;
                }
                ScanState::Framing => {
                    if self.buf.len() < BODY_LEN {
                        return Ok(None);
                    }

                    if self.buf[BODY_LEN - 1] != TAIL_MARKER {
                        // Desync: resume scanning at the byte after the
                        // consumed marker, which is the current buffer head.
                        self.state = ScanState::Seeking;
                        return Err(FrameError::Desync {
                            found: self.buf[BODY_LEN - 1],
                        });
                    }

                    let result = frame::decode(&self.buf[..BODY_LEN]);
                    self.buf.advance(BODY_LEN);
                    self.state = ScanState::Seeking;
                    return result.map(Some);
                }
            }
        }
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
