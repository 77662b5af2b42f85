//! Uniform random source seam.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::Rng;

/// Uniform `[0, 1)` generator injected into the engine.
pub trait RandomSource: Send + Sync {
    /// Next uniform draw in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// `true` with probability `p`.
    fn chance(&self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform integer in `[min, max]`. Returns `min` when the range is empty.
    fn range_inclusive(&self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f64;
        let offset = (self.next_f64() * span).floor() as i64;
        (min + offset).min(max)
    }

    /// Uniform index into a collection of `len` elements (`len > 0`).
    fn pick_index(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        ((self.next_f64() * len as f64).floor() as usize).min(len - 1)
    }
}

/// Thread-local RNG from `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Scripted draws, replayed in order.
///
/// Once the script runs out every draw returns the fallback value
/// (default `0.99`: top currency bracket, no bonus container).
#[derive(Debug)]
pub struct SequenceRandom {
    draws: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl SequenceRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: Mutex::new(draws.into_iter().collect()),
            fallback: 0.99,
        }
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    /// Append more draws to the script.
    pub fn push(&self, draws: impl IntoIterator<Item = f64>) {
        let mut queue = self.draws.lock().unwrap_or_else(|e| e.into_inner());
        queue.extend(draws);
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        let mut queue = self.draws.lock().unwrap_or_else(|e| e.into_inner());
        queue.pop_front().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_random_stays_in_unit_interval() {
        let rng = ThreadRandom;
        for _ in 0..1000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn sequence_replays_then_falls_back() {
        let rng = SequenceRandom::new([0.1, 0.7]).with_fallback(0.3);
        assert_eq!(rng.next_f64(), 0.1);
        assert_eq!(rng.next_f64(), 0.7);
        assert_eq!(rng.next_f64(), 0.3);
        rng.push([0.5]);
        assert_eq!(rng.next_f64(), 0.5);
    }

    #[test]
    fn range_inclusive_covers_both_ends() {
        let rng = SequenceRandom::new([0.0, 0.999_999, 0.5]);
        assert_eq!(rng.range_inclusive(8, 12), 8);
        assert_eq!(rng.range_inclusive(8, 12), 12);
        assert_eq!(rng.range_inclusive(8, 12), 10);
        assert_eq!(rng.range_inclusive(5, 5), 5);
    }

    #[test]
    fn pick_index_is_in_bounds() {
        let rng = SequenceRandom::new([0.0, 0.999_999, 0.5]);
        assert_eq!(rng.pick_index(4), 0);
        assert_eq!(rng.pick_index(4), 3);
        assert_eq!(rng.pick_index(4), 2);
        assert_eq!(rng.pick_index(1), 0);
    }
}
