//! Growable line accumulator shared by the line-oriented parser states

/// Byte accumulator with an explicit length kept separately from its
/// capacity.
///
/// Storage only ever grows: when a push would exceed the current capacity the
/// backing array is replaced by one at least twice as large, and the existing
/// bytes are copied over. [`LineBuffer::reset`] rewinds the length without
/// releasing memory, so a single allocation serves every line of a stream.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    data: Box<[u8]>,
    len:  usize,
}

impl LineBuffer {
    /// Create an empty buffer with `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            len:  0,
        }
    }

    /// Append one byte, growing the storage if it is full.
    pub fn push(&mut self, byte: u8) {
        let target = self.len + 1;
        if target > self.data.len() {
            self.grow(target);
        }
        self.data[self.len] = byte;
        self.len = target;
    }

    /// Make sure at least `capacity` bytes are available without touching the
    /// current contents. Never shrinks.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.data.len() {
            self.grow(capacity);
        }
    }

    /// Forget the contents. Capacity is kept.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// The bytes accumulated since the last reset.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Number of accumulated bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bytes have been accumulated since the last reset.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    fn grow(&mut self, required: usize) {
        let capacity = (self.data.len() << 1).max(required);
        let mut data = vec![0; capacity].into_boxed_slice();
        data[..self.len].copy_from_slice(&self.data[..self.len]);
        self.data = data;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl std::fmt::Display for LineBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}
