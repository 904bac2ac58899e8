//! Growable append-only typed integer buffers.
//!
//! The decoder's write side and the join paths append into these instead
//! of boxing every value. Capacity grows geometrically; `as_slice` is the
//! zero-copy export (invalidated by the next mutation, as usual for a
//! borrowed slice), `to_vec` the copying one.

/// Growable buffer of copyable primitives.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveBuffer<T: Copy> {
    values: Vec<T>,
}

impl<T: Copy> PrimitiveBuffer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Append one value, growing capacity at least twofold on overflow.
    pub fn append(&mut self, value: T) {
        self.grow_for(1);
        self.values.push(value);
    }

    /// Append every value of an iterator.
    pub fn extend(&mut self, values: impl IntoIterator<Item = T>) {
        for value in values {
            self.append(value);
        }
    }

    /// Contiguous-source fast path.
    pub fn extend_from_slice(&mut self, values: &[T]) {
        self.grow_for(values.len());
        self.values.extend_from_slice(values);
    }

    /// Append `count` copies of `value`.
    pub fn append_repeated(&mut self, value: T, count: usize) {
        self.grow_for(count);
        self.values.resize(self.values.len() + count, value);
    }

    /// Drop values beyond `len`. No-op when already shorter.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Ensure room for at least `capacity` total values.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.values.capacity() {
            self.values.reserve(capacity - self.values.len());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy the contents out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.values.clone()
    }

    /// Zero-copy borrow of the contents.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Consume the buffer, yielding its backing vector without a copy.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.values
    }

    fn grow_for(&mut self, extra: usize) {
        let needed = self.values.len() + extra;
        if needed > self.values.capacity() {
            let doubled = (self.values.capacity() * 2).max(8);
            self.values.reserve(doubled.max(needed) - self.values.len());
        }
    }
}

/// 64-bit integer buffer.
pub type IntBuffer = PrimitiveBuffer<i64>;
/// 32-bit integer buffer.
pub type Int32Buffer = PrimitiveBuffer<i32>;
