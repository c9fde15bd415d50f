//! Synthetic blocking workloads: a slow doubling calculation with a
//! configurable random delay. Used by the CLI demo and by tests.

use std::str::FromStr;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MapError;

/// Inclusive range of milliseconds a slow calculation blocks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min: 1000,
            max: 2000,
        }
    }
}

impl DelayRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn fixed(ms: u64) -> Self {
        Self { min: ms, max: ms }
    }

    pub fn validate(&self) -> Result<(), MapError> {
        if self.min > self.max {
            return Err(MapError::precondition(
                "delay_ms",
                format!("min {} is greater than max {}", self.min, self.max),
            ));
        }
        Ok(())
    }

    /// Draw one delay uniformly from the range.
    pub fn sample<G: Rng + ?Sized>(&self, rng: &mut G) -> Duration {
        if self.min >= self.max {
            return Duration::from_millis(self.min);
        }
        Duration::from_millis(rng.gen_range(self.min..=self.max))
    }
}

/// Parses `MS`, `MIN..MAX` or `MIN..=MAX`.
impl FromStr for DelayRange {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| -> Result<u64, MapError> {
            part.trim().parse::<u64>().map_err(|e| {
                MapError::precondition("delay_ms", format!("'{}': {}", part.trim(), e))
            })
        };
        let range = match s.split_once("..") {
            Some((lo, hi)) => DelayRange::new(parse(lo)?, parse(hi.trim_start_matches('='))?),
            None => DelayRange::fixed(parse(s)?),
        };
        range.validate()?;
        Ok(range)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    #[error("{value} * 2 overflows i64")]
    Overflow { value: i64 },
}

/// Doubles its input after blocking for a random delay.
#[derive(Clone, Copy, Debug, Default)]
pub struct SlowCalculation {
    pub delay: DelayRange,
}

impl SlowCalculation {
    pub fn new(delay: DelayRange) -> Self {
        Self { delay }
    }

    pub fn pause(&self) {
        let pause = self.delay.sample(&mut rand::thread_rng());
        thread::sleep(pause);
    }

    /// Wrapping `x * 2`.
    pub fn double(&self, x: i64) -> i64 {
        self.pause();
        x.wrapping_mul(2)
    }

    /// `x * 2`, failing instead of wrapping on overflow.
    pub fn try_double(&self, x: i64) -> Result<i64, WorkloadError> {
        self.pause();
        x.checked_mul(2).ok_or(WorkloadError::Overflow { value: x })
    }
}

/// Delay for `index` out of `n` so that index 0 is the slowest and `n - 1` the fastest.
pub fn descending_delay(index: usize, n: usize, step: Duration) -> Duration {
    step * n.saturating_sub(index) as u32
}
