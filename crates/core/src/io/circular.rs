/// Fixed-size window over the most recent bytes of a linear scan.
#[derive(Debug, Clone)]
pub struct CircularByteBuffer {
    buf: Vec<u8>,
    start: usize,
    len: usize,
}

impl CircularByteBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            start: 0,
            len: 0,
        }
    }

    /// Append a byte, dropping the oldest once full.
    pub fn push(&mut self, b: u8) {
        let cap = self.buf.len();
        if self.len < cap {
            self.buf[(self.start + self.len) % cap] = b;
            self.len += 1;
        } else {
            self.buf[self.start] = b;
            self.start = (self.start + 1) % cap;
        }
    }

    /// Whether the newest bytes equal `needle`.
    pub fn ends_with(&self, needle: &[u8]) -> bool {
        if needle.len() > self.len {
            return false;
        }
        let cap = self.buf.len();
        let skip = self.len - needle.len();
        needle
            .iter()
            .enumerate()
            .all(|(i, &b)| self.buf[(self.start + skip + i) % cap] == b)
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }
}
