const DATA_PREFIX: &str = "data: ";

/// Longest unterminated frame a session will buffer.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Splits a chunked response body into newline-terminated frames.
///
/// Bytes after the last `\n` stay buffered until the next chunk completes
/// the line.
pub struct FrameBuffer {
    buffer: Vec<u8>,
    // bytes before this offset are known to hold no `\n`
    scanned: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, without its line terminator.
    pub fn next_frame(&mut self) -> Option<String> {
        let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = self.scanned + offset;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        self.scanned = 0;
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// True once the unterminated tail outgrows [`MAX_FRAME_LEN`].
    pub fn is_oversized(&self) -> bool {
        self.pending() > MAX_FRAME_LEN
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the JSON text of a `data: ` frame, or `None` for keep-alives,
/// comments and every other frame kind.
pub fn data_payload(frame: &str) -> Option<&str> {
    frame.trim().strip_prefix(DATA_PREFIX)
}
