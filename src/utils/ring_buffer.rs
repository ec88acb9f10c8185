use alloc::{boxed::Box, vec::Vec};

/// Fixed-capacity circular buffer backing a trailing window of observations.
///
/// Pushing into a full buffer evicts and returns the oldest element, which is what the
/// rolling accumulators need to retract an observation from their running sums.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Slots, allocated once at construction.
    slots: Box<[T]>,
    /// Slot holding the oldest element.
    head: usize,
    /// Number of occupied slots, never more than `slots.len()`.
    len: usize,
}

impl<T: Default + Copy> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity can not be zero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, T::default());
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends `value` as the newest element, returning the evicted oldest element when
    /// the buffer was already full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let cap = self.capacity();
        if self.is_full() {
            let evicted = core::mem::replace(&mut self.slots[self.head], value);
            self.head = (self.head + 1) % cap;
            return Some(evicted);
        }
        self.slots[(self.head + self.len) % cap] = value;
        self.len += 1;
        None
    }

    /// Drops every element while keeping the allocation.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Iterates from the oldest to the newest element.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let cap = self.capacity();
        (0..self.len).map(move |i| &self.slots[(self.head + i) % cap])
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::RingBuffer;

    #[test]
    fn starts_empty() {
        let buf: RingBuffer<Option<f64>> = RingBuffer::new(4);
        assert_eq!(buf.capacity(), 4);
        assert_eq!(buf.len(), 0);
        assert!(!buf.is_full());
        assert_eq!(buf.iter().count(), 0);
    }

    #[test]
    fn push_evicts_oldest_once_full() {
        let mut buf = RingBuffer::new(2);
        assert_eq!(buf.push(Some(1.0)), None);
        assert_eq!(buf.push(None), None);
        assert!(buf.is_full());

        assert_eq!(buf.push(Some(3.0)), Some(Some(1.0)));
        assert_eq!(buf.push(Some(4.0)), Some(None));
        assert_eq!(buf.len(), 2);

        let elems: Vec<_> = buf.iter().copied().collect();
        assert_eq!(elems, vec![Some(3.0), Some(4.0)]);
    }

    #[test]
    fn iter_is_oldest_first_across_wraparound() {
        let mut buf = RingBuffer::new(3);
        for v in 1..=7 {
            buf.push(v);
        }
        let elems: Vec<_> = buf.iter().copied().collect();
        assert_eq!(elems, vec![5, 6, 7]);
    }

    #[test]
    fn clear_behaves_like_fresh_buffer() {
        let mut buf = RingBuffer::new(3);
        buf.push(1);
        buf.push(2);
        buf.push(3);
        buf.push(4);

        buf.clear();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.push(42), None);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![42]);
    }

    #[test]
    #[should_panic(expected = "capacity can not be zero")]
    fn zero_capacity_panics() {
        let _ = RingBuffer::<i32>::new(0);
    }
}
