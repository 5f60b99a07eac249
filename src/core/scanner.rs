//! # Scanner
//!
//! Pure frame splitter over a buffered byte stream.
//!
//! `scan` never performs I/O and never allocates. It looks at what has been buffered
//! so far and answers one of three things: a complete frame is available, more bytes
//! are needed, or the stream has ended cleanly. The streaming driver
//! ([`crate::core::codec::FrameCodec`] under `FramedRead`) owns the buffer.
//!
//! Because the length field is 16 bits, a frame never needs more than
//! [`MAX_FRAME_SIZE`](crate::core::frame::MAX_FRAME_SIZE) buffered bytes, whatever a
//! corrupt header claims.

use crate::core::frame::HEADER_SIZE;

/// Outcome of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan<'a> {
    /// A complete frame sits at the start of the buffer.
    Frame {
        /// Bytes to drop from the buffer: header plus payload.
        consumed: usize,
        /// The frame itself, header included.
        frame: &'a [u8],
    },
    /// The buffer holds a proper prefix of a frame (or nothing).
    NeedMore,
    /// End of stream with nothing left buffered.
    End,
}

/// Extract the first complete frame from `buf`.
///
/// `at_eof` signals that no further bytes will arrive. A partial frame at end of
/// stream still reports [`Scan::NeedMore`]; the driver decides that is truncation.
pub fn scan(buf: &[u8], at_eof: bool) -> Scan<'_> {
    if at_eof && buf.is_empty() {
        return Scan::End;
    }
    if buf.len() < HEADER_SIZE {
        return Scan::NeedMore;
    }

    let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let total = HEADER_SIZE + length;
    if buf.len() >= total {
        Scan::Frame {
            consumed: total,
            frame: &buf[..total],
        }
    } else {
        Scan::NeedMore
    }
}

/// Bytes still missing before the frame at the start of `buf` is complete.
/// Zero when a frame is ready. Used to size read-ahead.
pub fn bytes_needed(buf: &[u8]) -> usize {
    if buf.len() < HEADER_SIZE {
        return HEADER_SIZE - buf.len();
    }
    let total = HEADER_SIZE + u16::from_be_bytes([buf[2], buf[3]]) as usize;
    total.saturating_sub(buf.len())
}
