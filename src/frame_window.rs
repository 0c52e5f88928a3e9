//! Fixed-capacity sliding window of inter-frame intervals.

use std::collections::VecDeque;

/// Default window capacity used by the frame monitor (60 frames).
pub const FRAME_WINDOW_CAPACITY: usize = 60;

/// Ring buffer of frame intervals in milliseconds.
///
/// Pushing into a full window evicts the oldest interval.
#[derive(Debug, Clone)]
pub struct FrameWindow {
    intervals: VecDeque<f64>,
    capacity: usize,
}

impl FrameWindow {
    /// Create a window with the default capacity (60 intervals).
    pub fn new() -> Self {
        Self::with_capacity(FRAME_WINDOW_CAPACITY)
    }

    /// Create a window with a specific capacity (at least one entry).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            intervals: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an interval, removing the oldest if at capacity.
    pub fn push(&mut self, interval_ms: f64) {
        if self.intervals.len() >= self.capacity {
            self.intervals.pop_front();
        }
        self.intervals.push_back(interval_ms);
    }

    /// Mean interval. Returns 0.0 if the window is empty.
    pub fn mean(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        self.intervals.iter().sum::<f64>() / self.intervals.len() as f64
    }

    /// Median interval. Returns 0.0 if the window is empty.
    ///
    /// For an even count the two middle values are averaged.
    pub fn median(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.intervals.iter().copied().collect();
        sorted.sort_unstable_by(f64::total_cmp);

        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.intervals.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.intervals.iter()
    }
}

impl Default for FrameWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Property: the window never grows past its capacity and always keeps
        // the most recent intervals in push order.
        #[test]
        fn prop_window_keeps_most_recent_intervals(
            intervals in prop::collection::vec(0.1f64..100.0f64, 0..200)
        ) {
            let mut window = FrameWindow::new();

            for interval in &intervals {
                window.push(*interval);
                prop_assert!(window.len() <= FRAME_WINDOW_CAPACITY);
            }

            let expected_start = intervals.len().saturating_sub(FRAME_WINDOW_CAPACITY);
            let kept: Vec<f64> = window.iter().copied().collect();
            prop_assert_eq!(kept, intervals[expected_start..].to_vec());
        }
    }

    #[test]
    fn test_mean_of_empty_window_is_zero() {
        let window = FrameWindow::new();
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.median(), 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_mean_and_median() {
        let mut window = FrameWindow::with_capacity(5);
        for interval in [16.0, 17.0, 50.0, 16.0, 18.0] {
            window.push(interval);
        }

        assert_eq!(window.mean(), 23.4);
        // One 50ms hitch does not move the median.
        assert_eq!(window.median(), 17.0);
        assert!(window.is_full());
    }

    #[test]
    fn test_median_of_even_count() {
        let mut window = FrameWindow::with_capacity(4);
        for interval in [8.0, 10.0, 12.0, 100.0] {
            window.push(interval);
        }
        assert_eq!(window.median(), 11.0);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut window = FrameWindow::with_capacity(0);
        window.push(1.0);
        window.push(2.0);
        assert!(window.is_full());
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2.0]);
    }
}
