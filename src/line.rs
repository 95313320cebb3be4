//! Line-based codec for tokio.
//!
//! Reads and writes newline-terminated lines. The transport frames on
//! newline only; it never interprets line content.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};

/// Default maximum line length in bytes (IRC standard).
pub const MAX_LINE_LEN: usize = 512;

/// Newline-framing codec.
///
/// Decodes UTF-8 lines (terminator included) and encodes strings with a
/// CRLF appended when missing. Lines beyond the length limit are rejected
/// as [`ProtocolError::MessageTooLong`]; the oversized line is consumed, so
/// the stream stays usable.
pub struct LineCodec {
    /// Index of next byte to check for a newline.
    next_index: usize,
    /// Maximum line length.
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the standard 512-byte limit.
    pub fn new() -> Self {
        Self {
            next_index: 0,
            max_len: MAX_LINE_LEN,
        }
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let data = String::from_utf8(line.to_vec())?;
            Ok(Some(data))
        } else {
            // No full line yet; remember where scanning left off.
            self.next_index = src.len();

            // A partial line past the limit will never become valid; fail
            // now instead of buffering a newline-less stream without bound.
            if src.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }

            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        if !line.ends_with('\n') {
            dst.extend_from_slice(b"\r\n");
        }
        Ok(())
    }
}
