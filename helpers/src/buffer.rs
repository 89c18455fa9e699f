/// RingBuffer provides a buffer with a user-defined capacity. As soon as the capacity is reached,
/// the buffer overwrites the oldest value when a new value is pushed to it. Iteration always runs
/// from the oldest to the newest value.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    vals: Vec<T>,
    capacity: usize,
    idx: usize, // position of the oldest value once the buffer is full
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> RingBuffer<T> {
        RingBuffer {
            vals: Vec::with_capacity(capacity),
            capacity,
            idx: 0,
        }
    }

    /// push appends a value and returns the value that was dropped to make room for it (if any).
    pub fn push(&mut self, val: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(val);
        }

        if self.vals.len() < self.capacity {
            self.vals.push(val);
            None
        } else {
            let dropped = std::mem::replace(&mut self.vals[self.idx], val);
            self.idx = (self.idx + 1) % self.capacity;
            Some(dropped)
        }
    }

    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.vals.clear();
        self.idx = 0;
    }

    /// iter returns an iterator over the stored values in insertion order (oldest first).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.vals.split_at(self.idx);
        older.iter().chain(newer.iter())
    }

    pub fn last(&self) -> Option<&T> {
        self.iter().next_back()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// to_vec returns a copy of the stored values in insertion order (oldest first).
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
