/// Unterminated bytes a [`LineBuffer`] holds before it gives up on the line.
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Reassembles newline-delimited text from arbitrary TCP chunks.
///
/// Text is released only when the accumulated bytes end in `\n`, so a chunk
/// boundary inside a record (or inside a multi-byte character) never yields a
/// partial line. An unterminated tail longer than the limit is discarded and
/// counted; see [`LineBuffer::take_dropped`].
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero limit is raised to one.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit: limit.max(1),
            dropped: 0,
        }
    }

    /// Appends `chunk`; returns the whole buffered text once it ends with a newline.
    ///
    /// Past the limit, complete lines are released early and a tail that is
    /// still over the limit is dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Option<String> {
        if chunk.is_empty() {
            return None;
        }
        self.buf.extend_from_slice(chunk);
        if self.buf.last() == Some(&b'\n') {
            let text = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            return Some(text);
        }
        if self.buf.len() <= self.limit {
            return None;
        }

        let complete = self.buf.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        let text =
            (complete > 0).then(|| String::from_utf8_lossy(&self.buf[..complete]).into_owned());
        let tail = self.buf.len() - complete;
        if tail > self.limit {
            self.dropped += tail;
            self.buf.clear();
        } else {
            self.buf.drain(..complete);
        }
        text
    }

    /// Bytes waiting for a terminating newline.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Bytes discarded for overflowing the limit since the last call.
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }
}

/// Non-empty lines of a released text block.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_text_until_newline() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"{\"a\":"), None);
        assert_eq!(buffer.push(b"1}\n{\"b\""), None);
        let text = buffer.push(b":2}\n").unwrap();
        assert_eq!(split_lines(&text).collect::<Vec<_>>(), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn drops_empty_lines_and_keeps_split_utf8() {
        let mut buffer = LineBuffer::new();
        let bytes = "ü\n\n".as_bytes();
        assert_eq!(buffer.push(&bytes[..1]), None);
        let text = buffer.push(&bytes[1..]).unwrap();
        assert_eq!(split_lines(&text).collect::<Vec<_>>(), vec!["ü"]);
    }

    #[test]
    fn overflowing_tail_is_dropped_and_counted() {
        let mut buffer = LineBuffer::with_limit(8);
        assert_eq!(buffer.push(b"abcdef"), None);
        assert_eq!(buffer.push(b"ghij"), None);
        assert_eq!(buffer.pending(), 0);
        assert_eq!(buffer.take_dropped(), 10);
        assert_eq!(buffer.take_dropped(), 0);

        // The stream recovers at the next newline.
        assert_eq!(buffer.push(b"rest\nok\n").as_deref(), Some("rest\nok\n"));
    }

    #[test]
    fn overflow_releases_complete_lines_first() {
        let mut buffer = LineBuffer::with_limit(8);
        let text = buffer.push(b"one\ntwo\nthr").unwrap();
        assert_eq!(split_lines(&text).collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(buffer.pending(), 3);
        assert_eq!(buffer.take_dropped(), 0);
        assert_eq!(buffer.push(b"ee\n").as_deref(), Some("three\n"));
    }
}
