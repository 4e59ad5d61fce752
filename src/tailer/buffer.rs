//! Carry-over buffer for lines that arrive in pieces

/// Accumulates raw bytes and yields only newline-terminated lines.
///
/// A line is never emitted before its `\n` has been seen, so a slow writer
/// that flushes half a line is handled on the next read. A trailing `\r` is
/// stripped. Bytes are decoded lossily once the whole line is present, which
/// keeps multi-byte characters intact across read boundaries.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let mut line = &self.pending[start..end];
            if let Some((b'\r', rest)) = line.split_last() {
                line = rest;
            }
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Bytes held back waiting for a terminator
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
