//! Bounded FIFO of recent updates backing the performance statistics

use crate::law::AxisStats;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSample {
    pub error: f64,
    pub output: f64,
    pub saturated: bool,
    pub in_deadband: bool,
}

/// Keeps the last `capacity` samples; the oldest is evicted first
#[derive(Debug, Clone)]
pub struct PerformanceWindow {
    capacity: usize,
    samples: VecDeque<AxisSample>,
}

impl PerformanceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: AxisSample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&AxisSample> {
        self.samples.back()
    }

    pub fn stats(&self) -> AxisStats {
        let n = self.samples.len();
        if n == 0 {
            return AxisStats::default();
        }
        let count = n as f64;

        let mean_abs_error = self.samples.iter().map(|s| s.error.abs()).sum::<f64>() / count;
        let mean_output = self.samples.iter().map(|s| s.output).sum::<f64>() / count;
        let output_variance = self
            .samples
            .iter()
            .map(|s| (s.output - mean_output).powi(2))
            .sum::<f64>()
            / count;
        let saturated = self.samples.iter().filter(|s| s.saturated).count();
        let in_deadband = self.samples.iter().filter(|s| s.in_deadband).count();

        AxisStats {
            samples: n,
            mean_abs_error,
            mean_output,
            output_variance,
            saturation_rate: saturated as f64 / count,
            deadband_rate: in_deadband as f64 / count,
        }
    }

    /// Output variance over the last `window` samples is below `tolerance`
    pub fn is_stable(&self, tolerance: f64, window: usize) -> bool {
        if window == 0 || self.samples.len() < window {
            return false;
        }
        let recent: Vec<f64> = self
            .samples
            .iter()
            .skip(self.samples.len() - window)
            .map(|s| s.output)
            .collect();
        let mean = recent.iter().sum::<f64>() / window as f64;
        let variance = recent.iter().map(|o| (o - mean).powi(2)).sum::<f64>() / window as f64;
        variance < tolerance
    }
}
