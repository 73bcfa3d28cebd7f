//! CRLF line framing for `tokio_util::codec`.
//!
//! Inbound bytes are split on LF, a trailing CR is dropped and the text is
//! decoded lossily, so a malformed line never ends the stream. Lines longer
//! than the limit are skipped whole. Outbound lines get CRLF appended and
//! are refused if they already contain a line terminator.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::CodecError;
use crate::util::MAX_LINE_LEN;

/// Line codec for the chat protocol.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_len: usize,
    next_index: usize,
    discarding: bool,
}

impl LineCodec {
    /// Codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }

    /// Codec accepting lines up to `max_line_len` bytes, terminator included.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            max_line_len,
            next_index: 0,
            discarding: false,
        }
    }

    /// Configured limit.
    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    fn to_text(line: &[u8]) -> String {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim_end_matches(['\r', '\n']);
        if trimmed.contains('\0') {
            trimmed.replace('\0', "")
        } else {
            trimmed.to_string()
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
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        loop {
            let newline = buf[self.next_index..].iter().position(|&b| b == b'\n');

            let Some(offset) = newline else {
                if self.discarding {
                    buf.clear();
                    self.next_index = 0;
                } else if buf.len() > self.max_line_len {
                    warn!(
                        buffered = buf.len(),
                        limit = self.max_line_len,
                        "discarding over-long line"
                    );
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };

            let end = self.next_index + offset + 1;
            self.next_index = 0;
            let line = buf.split_to(end);

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_line_len {
                warn!(
                    length = line.len(),
                    limit = self.max_line_len,
                    "discarding over-long line"
                );
                continue;
            }

            let text = Self::to_text(&line);
            if text.is_empty() {
                continue;
            }
            return Ok(Some(text));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if buf.is_empty() || self.discarding {
            buf.clear();
            return Ok(None);
        }
        let rest = buf.split();
        let text = Self::to_text(&rest);
        Ok((!text.is_empty()).then_some(text))
    }
}

impl Encoder<String> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), CodecError> {
        <Self as Encoder<&str>>::encode(self, line.as_str(), buf)
    }
}

impl Encoder<&str> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, line: &str, buf: &mut BytesMut) -> Result<(), CodecError> {
        if let Some(ch) = line.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(CodecError::IllegalControlChar(ch));
        }
        let total = line.len() + 2;
        if total > self.max_line_len {
            return Err(CodecError::LineTooLong {
                actual: total,
                limit: self.max_line_len,
            });
        }
        buf.reserve(total);
        buf.put_slice(line.as_bytes());
        buf.put_slice(b"\r\n");
        Ok(())
    }
}
