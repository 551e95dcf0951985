//! Fixed-window rolling mean

use std::collections::VecDeque;

/// Rolling mean over the last `window` values.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    /// A zero window is bumped to one so the accumulator always holds a value.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self { window, values: VecDeque::with_capacity(window), sum: 0.0 }
    }

    /// Non-finite values are ignored.
    pub fn add(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.window {
            if let Some(oldest) = self.values.pop_front() {
                self.sum -= oldest;
            }
        }
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }

    /// True once at least `min(3, window)` values are held.
    pub fn has_enough_data(&self) -> bool {
        self.values.len() >= self.window.min(3)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
