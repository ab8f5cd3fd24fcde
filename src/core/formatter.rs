use html_escape::decode_html_entities;
use thiserror::Error;

/// Telegram rejects messages longer than this many bytes.
pub const TELEGRAM_MAX_MESSAGE_BYTES: usize = 4096;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitError {
    #[error("max_bytes must be greater than zero")]
    ZeroMaxBytes,

    #[error("max_bytes is too small to fit the next character")]
    CharTooWide,
}

/// Splits `s` into consecutive slices of at most `max_bytes` bytes without
/// cutting a UTF-8 character in half.
pub fn split_safe_utf8(s: &str, max_bytes: usize) -> Result<Vec<&str>, SplitError> {
    if max_bytes == 0 {
        return Err(SplitError::ZeroMaxBytes);
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < s.len() {
        if s.len() - start <= max_bytes {
            chunks.push(&s[start..]);
            break;
        }

        let mut end = start + max_bytes;
        while !s.is_char_boundary(end) {
            end -= 1;
        }

        if end == start {
            return Err(SplitError::CharTooWide);
        }

        chunks.push(&s[start..end]);
        start = end;
    }

    Ok(chunks)
}

/// Caption text comes double-escaped (`&amp;#39;`), so a single decoding
/// pass can leave `&#39;` behind.
pub fn decode_caption_text(raw: &str) -> String {
    decode_html_entities(raw).replace("&#39;", "'")
}

/// Packs chunks into newline-joined messages that never exceed `max_bytes`.
///
/// Chunks must already be at most `max_bytes` long (see [`split_safe_utf8`]).
#[derive(Debug)]
pub struct MessageBatcher {
    buffer: String,
    max_bytes: usize,
}

impl MessageBatcher {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: String::with_capacity(max_bytes),
            max_bytes,
        }
    }

    /// Appends a chunk. When it does not fit, the buffered message is
    /// returned first and the chunk starts a new one.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        let additional = if self.buffer.is_empty() {
            chunk.len()
        } else {
            chunk.len() + 1
        };

        let flushed = if !self.buffer.is_empty() && self.buffer.len() + additional > self.max_bytes
        {
            Some(std::mem::replace(
                &mut self.buffer,
                String::with_capacity(self.max_bytes),
            ))
        } else {
            None
        };

        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(chunk);

        flushed
    }

    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}
