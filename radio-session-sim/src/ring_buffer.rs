/// Fixed-capacity circular FIFO backing one loopback channel.
///
/// Not synchronized; the loopback wraps it in a `parking_lot::Mutex`.
///
/// Overflow behavior: drops the oldest items and reports how many were
/// dropped, which the receive side turns into an overflow indication.
#[derive(Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    write_index: usize,
    read_index: usize,
    available: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![T::default(); capacity.max(1)],
            write_index: 0,
            read_index: 0,
            available: 0,
        }
    }

    /// Append `items`, returning the number of old items dropped to make room.
    ///
    /// If `items` is longer than the capacity, only its tail is kept.
    pub fn write(&mut self, items: &[T]) -> usize {
        if items.is_empty() {
            return 0;
        }
        let capacity = self.capacity();

        let skipped = items.len().saturating_sub(capacity);
        let items = &items[skipped..];

        let overflow = (self.available + items.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % capacity;
            self.available -= overflow;
        }

        for &item in items {
            self.buffer[self.write_index] = item;
            self.write_index = (self.write_index + 1) % capacity;
        }
        self.available += items.len();
        overflow + skipped
    }

    /// Move up to `out.len()` items into `out`, returning how many were moved.
    pub fn read_into(&mut self, out: &mut [T]) -> usize {
        let to_read = out.len().min(self.available);
        let capacity = self.capacity();
        for (i, slot) in out.iter_mut().take(to_read).enumerate() {
            *slot = self.buffer[(self.read_index + i) % capacity];
        }
        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        to_read
    }

    pub fn count(&self) -> usize {
        self.available
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}
