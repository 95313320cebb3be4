//! IRC message codec for tokio.
//!
//! Wraps [`LineCodec`] and converts between raw lines and [`Message`]
//! values at the framing boundary.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};
use crate::line::LineCodec;
use crate::message::Message;

/// Tokio codec for encoding/decoding IRC [`Message`] values.
pub struct MessageCodec {
    inner: LineCodec,
}

impl MessageCodec {
    /// Create a codec with the standard line-length limit.
    pub fn new() -> Self {
        Self {
            inner: LineCodec::new(),
        }
    }

    /// Sanitize outgoing message data by truncating at the first line
    /// ending, so a crafted message body cannot smuggle extra lines.
    fn sanitize(mut data: String) -> String {
        if let Some(pos) = data.find(|c| c == '\r' || c == '\n') {
            data.truncate(pos);
        }
        data
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        self.inner
            .decode(src)
            .and_then(|res| res.map_or(Ok(None), |line| line.parse::<Message>().map(Some)))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        let sanitized = Self::sanitize(msg.to_string());
        self.inner.encode(sanitized, dst)
    }
}
