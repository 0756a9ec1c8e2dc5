//! Frame encoding and decoding.
//!
//! Wire format per frame: `<command>:<payload>\0`. Frames are concatenated
//! with no length prefix, so the decoder scans for the next NUL to find the
//! end of a frame and for the first `:` inside it to split command from
//! payload.

use tracing::debug;

use crate::error::CodecError;

/// Separates command from payload.
pub const SEPARATOR: u8 = b':';

/// Terminates every frame.
pub const TERMINATOR: u8 = 0;

/// Command marking the end of one message on a stream.
pub const COMMIT: &str = "commit";

/// Literal sent in place of an absent string value.
pub const NONE_LITERAL: &str = "None";

// ============================================================================
// Frame
// ============================================================================

/// One command + payload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Short ASCII command name.
    pub command: String,
    /// Raw payload bytes (never contains NUL).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame. NUL bytes are dropped from the payload since they
    /// would terminate the frame early.
    pub fn new(command: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        let mut payload = payload.into();
        payload.retain(|&b| b != TERMINATOR);
        Self {
            command: command.into(),
            payload,
        }
    }

    /// Creates a text frame, writing [`NONE_LITERAL`] for `None`.
    pub fn text(command: impl Into<String>, value: Option<&str>) -> Self {
        Self::new(command, value.unwrap_or(NONE_LITERAL).as_bytes())
    }

    /// Creates the end-of-message marker.
    pub fn commit() -> Self {
        Self::new(COMMIT, Vec::new())
    }

    /// True for the end-of-message marker.
    pub fn is_commit(&self) -> bool {
        self.command == COMMIT
    }

    /// Returns the payload as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidUtf8`] if the payload is not UTF-8.
    pub fn payload_str(&self) -> Result<&str, CodecError> {
        std::str::from_utf8(&self.payload).map_err(|_| CodecError::InvalidUtf8(self.command.clone()))
    }

    /// Returns the payload as optional text, mapping [`NONE_LITERAL`] to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidUtf8`] if the payload is not UTF-8.
    pub fn optional_text(&self) -> Result<Option<String>, CodecError> {
        let text = self.payload_str()?;
        Ok((text != NONE_LITERAL).then(|| text.to_string()))
    }

    /// Appends the encoded frame to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.command.len() + self.payload.len() + 2);
        out.extend_from_slice(self.command.as_bytes());
        out.push(SEPARATOR);
        out.extend_from_slice(&self.payload);
        out.push(TERMINATOR);
    }

    /// Encodes the frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Parses one frame without its terminator.
    ///
    /// # Errors
    ///
    /// Fails if there is no separator or the command is not printable ASCII.
    pub fn parse(raw: &[u8]) -> Result<Self, CodecError> {
        let split = raw
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or(CodecError::MissingSeparator)?;
        let (command, payload) = (&raw[..split], &raw[split + 1..]);

        if command.is_empty() || !command.iter().all(u8::is_ascii_graphic) {
            return Err(CodecError::InvalidCommand(
                String::from_utf8_lossy(command).into_owned(),
            ));
        }

        Ok(Self {
            // Checked above: printable ASCII is valid UTF-8.
            command: String::from_utf8_lossy(command).into_owned(),
            payload: payload.to_vec(),
        })
    }
}

/// Encodes a sequence of frames back to back.
pub fn encode_frames<'a>(frames: impl IntoIterator<Item = &'a Frame>) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        frame.encode_into(&mut out);
    }
    out
}

/// Decodes a complete buffer into frames, skipping malformed ones.
///
/// Trailing bytes without a terminator are parsed as a last frame so files
/// written by producers that omit the final NUL still decode.
pub fn decode_frames(data: &[u8]) -> Vec<Frame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push(data);
    frames.extend(decoder.finish());
    frames
}

// ============================================================================
// Incremental decoder
// ============================================================================

/// Incremental frame decoder for stream reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes in and returns every frame completed by them.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == TERMINATOR) {
            let end = start + offset;
            if end > start {
                match Frame::parse(&self.buffer[start..end]) {
                    Ok(frame) => frames.push(frame),
                    Err(e) => debug!(error = %e, "Skipping malformed frame"),
                }
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        frames
    }

    /// Number of buffered bytes not yet forming a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Parses whatever is left as a final, unterminated frame.
    pub fn finish(self) -> Option<Frame> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match Frame::parse(&self.buffer) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!(error = %e, "Discarding trailing bytes");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = Frame::new("url", "https://example.com");
        assert_eq!(frame.encode(), b"url:https://example.com\0".to_vec());
        assert_eq!(Frame::commit().encode(), b"commit:\0".to_vec());
    }

    #[test]
    fn test_payload_may_contain_separator() {
        let frames = decode_frames(b"url:https://a.b/c?d=e:f\0");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "url");
        assert_eq!(frames[0].payload_str().unwrap(), "https://a.b/c?d=e:f");
    }

    #[test]
    fn test_nul_is_stripped_from_payload() {
        let frame = Frame::new("page_content", b"a\0b".to_vec());
        assert_eq!(frame.payload, b"ab".to_vec());
    }

    #[test]
    fn test_none_literal() {
        let frame = Frame::text("encoding", None);
        assert_eq!(frame.payload, b"None".to_vec());
        assert_eq!(frame.optional_text().unwrap(), None);
        assert_eq!(
            Frame::text("encoding", Some("utf-8")).optional_text().unwrap().as_deref(),
            Some("utf-8")
        );
    }

    #[test]
    fn test_malformed_frames_are_skipped() {
        let frames = decode_frames(b"garbage\0status_code:200\0 bad:x\0\0url:u\0");
        let commands: Vec<_> = frames.iter().map(|f| f.command.as_str()).collect();
        assert_eq!(commands, vec!["status_code", "url"]);
    }

    #[test]
    fn test_unterminated_tail_is_parsed() {
        let frames = decode_frames(b"url:a\0status_code:200");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].payload_str().unwrap(), "200");
    }

    #[test]
    fn test_incremental_decoder_splits_across_reads() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"ur").is_empty());
        assert!(decoder.push(b"l:http").is_empty());
        let frames = decoder.push(b"s://x\0commit:");
        assert_eq!(frames, vec![Frame::new("url", "https://x")]);
        assert_eq!(decoder.pending(), "commit:".len());
        let frames = decoder.push(b"\0");
        assert!(frames[0].is_commit());
        assert_eq!(decoder.pending(), 0);
        assert!(decoder.finish().is_none());
    }
}
