//! Fixed-capacity sample history with FIFO eviction.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::engine::events::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

/// Ring buffer of samples. The oldest sample is dropped once `capacity` is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    capacity: usize,
    points: VecDeque<TimeSeriesPoint>,
}

impl TimeSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    /// Rebuild from stored points, keeping only the most recent `capacity`.
    pub fn from_points(capacity: usize, points: impl IntoIterator<Item = TimeSeriesPoint>) -> Self {
        let mut series = Self::new(capacity);
        for p in points {
            series.push(p.timestamp, p.value);
        }
        series
    }

    pub fn push(&mut self, timestamp: Timestamp, value: f64) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(TimeSeriesPoint { timestamp, value });
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&TimeSeriesPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.points.iter()
    }

    /// Up to `n` most recent points, oldest first.
    pub fn recent(&self, n: usize) -> Vec<TimeSeriesPoint> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).copied().collect()
    }

    /// Mean of the `len` samples ending `offset` samples before the newest.
    /// `None` when the window is not fully populated.
    pub fn window_mean(&self, offset: usize, len: usize) -> Option<f64> {
        if len == 0 || self.points.len() < offset + len {
            return None;
        }
        let end = self.points.len() - offset;
        let sum: f64 = self.points.range(end - len..end).map(|p| p.value).sum();
        Some(sum / len as f64)
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_most_recent_in_order() {
        let mut s = TimeSeries::new(3);
        for i in 0..5u64 {
            s.push(i, i as f64);
        }
        assert_eq!(s.len(), 3);
        let ts: Vec<u64> = s.iter().map(|p| p.timestamp).collect();
        assert_eq!(ts, vec![2, 3, 4]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut s = TimeSeries::new(3600);
        for i in 0..3700u64 {
            s.push(i * 1000, 1.0);
            assert!(s.len() <= 3600);
        }
        assert_eq!(s.iter().next().unwrap().timestamp, 100_000);
    }

    #[test]
    fn test_window_mean() {
        let mut s = TimeSeries::new(100);
        for v in [1.0, 2.0, 3.0, 4.0, 10.0, 20.0] {
            s.push(0, v);
        }
        assert_eq!(s.window_mean(0, 2), Some(15.0));
        assert_eq!(s.window_mean(2, 2), Some(3.5));
        assert_eq!(s.window_mean(5, 2), None);
    }

    #[test]
    fn test_recent_and_restore_truncate() {
        let mut s = TimeSeries::new(10);
        for i in 0..10u64 {
            s.push(i, i as f64);
        }
        let tail = s.recent(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].timestamp, 7);
        assert_eq!(s.recent(50).len(), 10);

        let smaller = TimeSeries::from_points(4, s.iter().copied());
        assert_eq!(smaller.len(), 4);
        assert_eq!(smaller.last().unwrap().timestamp, 9);
    }
}
