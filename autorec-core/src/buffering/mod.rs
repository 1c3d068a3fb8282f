//! Fixed-capacity sliding windows and the chunk type.
//!
//! `Window<T>` wraps a `ringbuf::HeapRb<T>` that is allocated once at its
//! final capacity. Pushing into a full window overwrites the oldest element,
//! so a window never grows and never reallocates.

pub mod chunk;

use ringbuf::{
    traits::{Consumer, Observer, RingBuffer},
    HeapRb,
};

/// A bounded FIFO of the most recent `capacity` values.
pub struct Window<T> {
    ring: HeapRb<T>,
}

impl<T: Copy> Window<T> {
    /// `capacity` is raised to 1 so an empty window can still accept samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity.max(1)),
        }
    }

    /// Append `value`, evicting the oldest element when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        self.ring.push_overwrite(value)
    }

    /// Oldest-to-newest iteration over the live window.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.ring.iter()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for Window<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut w = Window::new(3);
        for v in 1..=5 {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut w = Window::new(0);
        assert_eq!(w.capacity(), 1);
        w.push(1.0);
        w.push(2.0);
        assert_eq!(w.iter().copied().collect::<Vec<f64>>(), vec![2.0]);
    }

    #[test]
    fn clear_empties_window() {
        let mut w = Window::new(4);
        w.push(true);
        w.clear();
        assert!(w.is_empty());
    }
}
