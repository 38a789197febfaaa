//! Sliding feature window
//!
//! Bounded FIFO of the most recent feature vectors. Scoring is gated on the window
//! being full; the contents are persisted so a restart does not cause a cold start.

use std::collections::VecDeque;

use crate::types::FeatureVector;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindow {
    capacity: usize,
    vectors: VecDeque<FeatureVector>,
}

impl FeatureWindow {
    /// Create an empty window holding at most `capacity` vectors (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            vectors: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild from persisted vectors, keeping only the newest `capacity`
    pub fn restore(capacity: usize, persisted: Vec<FeatureVector>) -> Self {
        let mut window = Self::new(capacity);
        for v in persisted {
            window.push(v);
        }
        window
    }

    /// Append a vector, evicting the oldest when over capacity
    pub fn push(&mut self, vector: FeatureVector) {
        self.vectors.push_back(vector);
        while self.vectors.len() > self.capacity {
            self.vectors.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.vectors.len() == self.capacity
    }

    /// Oldest first
    pub fn to_vec(&self) -> Vec<FeatureVector> {
        self.vectors.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked(i: usize) -> FeatureVector {
        FeatureVector::new([i as f64 / 100.0, 0.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_fills_then_stays_at_capacity() {
        let mut window = FeatureWindow::new(10);
        for i in 0..9 {
            window.push(marked(i));
            assert!(!window.is_full());
        }
        window.push(marked(9));
        assert!(window.is_full());
        assert_eq!(window.len(), 10);

        for i in 10..25 {
            window.push(marked(i));
            assert_eq!(window.len(), 10);
        }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut window = FeatureWindow::new(3);
        for i in 0..5 {
            window.push(marked(i));
        }
        assert_eq!(window.to_vec(), vec![marked(2), marked(3), marked(4)]);
    }

    #[test]
    fn test_restore_trims_to_newest() {
        let persisted: Vec<_> = (0..15).map(marked).collect();
        let window = FeatureWindow::restore(10, persisted);
        assert_eq!(window.len(), 10);
        assert_eq!(window.to_vec().first(), Some(&marked(5)));
        assert_eq!(window.to_vec().last(), Some(&marked(14)));
    }

    #[test]
    fn test_zero_capacity_is_bumped_to_one() {
        let mut window = FeatureWindow::new(0);
        window.push(marked(1));
        window.push(marked(2));
        assert_eq!(window.to_vec(), vec![marked(2)]);
        assert!(window.is_full());
    }
}
