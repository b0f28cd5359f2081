//! Timed value ramps
//!
//! A fade writes an interpolated value on every tick until the ramp time has
//! elapsed, finishing with a write of exactly the target value. Fades run as
//! detached tasks: there is no handle to await or cancel them, and two fades
//! on the same parameter interleave their writes (the last write wins).

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::{Parameter, Value};

pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Fade timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeConfig {
    /// Interval between two writes
    pub tick: Duration,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

/// Linear interpolation clamped to `[start, target]`
///
/// `fraction <= 0` (or NaN) yields `start`, `fraction >= 1` yields exactly
/// `target`; in between the result is rounded to the nearest integer and
/// never leaves the `[start, target]` interval, whatever the magnitudes.
pub fn lerp_clamp(start: Value, target: Value, fraction: f64) -> Value {
    if fraction.is_nan() || fraction <= 0.0 {
        start
    } else if fraction >= 1.0 {
        target
    } else {
        let span = (i128::from(target) - i128::from(start)) as f64;
        let blended = i128::from(start) + (fraction * span).round() as i128;
        let (low, high) = (start.min(target), start.max(target));
        blended.clamp(i128::from(low), i128::from(high)) as Value
    }
}

/// One running ramp
#[derive(Debug, Clone, Copy)]
pub struct FadeTask {
    pub param: Parameter,
    pub start: Value,
    pub target: Value,
    pub duration: Duration,
    pub tick: Duration,
}

impl FadeTask {
    /// Drive the ramp to completion, calling `write` once per tick
    ///
    /// A failed write is logged and the ramp carries on.
    pub async fn run<F>(self, mut write: F)
    where
        F: FnMut(Parameter, Value) -> Result<()>,
    {
        debug!(
            "Fade {} {} -> {} over {:?}",
            self.param, self.start, self.target, self.duration
        );

        let started = Instant::now();
        loop {
            sleep(self.tick).await;

            let elapsed = started.elapsed();
            let fraction = if self.duration.is_zero() {
                1.0
            } else {
                elapsed.as_secs_f64() / self.duration.as_secs_f64()
            };

            let value = lerp_clamp(self.start, self.target, fraction);
            if let Err(e) = write(self.param, value) {
                warn!("Fade write for {} failed: {}", self.param, e);
            }

            if elapsed >= self.duration {
                break;
            }
        }

        debug!("Fade {} finished at {}", self.param, self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::TransportError;

    #[test]
    fn test_lerp_clamp_bounds() {
        assert_eq!(lerp_clamp(10, 20, -0.5), 10);
        assert_eq!(lerp_clamp(10, 20, 0.0), 10);
        assert_eq!(lerp_clamp(10, 20, 1.0), 20);
        assert_eq!(lerp_clamp(10, 20, 3.0), 20);
        assert_eq!(lerp_clamp(10, 20, f64::NAN), 10);
    }

    #[test]
    fn test_lerp_clamp_linear_both_halves() {
        assert_eq!(lerp_clamp(0, 100, 0.25), 25);
        assert_eq!(lerp_clamp(0, 100, 0.5), 50);
        assert_eq!(lerp_clamp(0, 100, 0.75), 75);
        assert_eq!(lerp_clamp(100, 0, 0.25), 75);
        assert_eq!(lerp_clamp(-32768, 1000, 0.5), -15884);
    }

    #[test]
    fn test_lerp_clamp_rounds() {
        assert_eq!(lerp_clamp(0, 3, 0.5), 2);
        assert_eq!(lerp_clamp(0, 10, 0.04), 0);
        assert_eq!(lerp_clamp(0, 10, 0.06), 1);
    }

    #[test]
    fn test_lerp_clamp_extreme_span() {
        assert_eq!(lerp_clamp(i64::MIN, i64::MAX, 0.0), i64::MIN);
        assert_eq!(lerp_clamp(i64::MIN, i64::MAX, 1.0), i64::MAX);
        assert!(lerp_clamp(i64::MIN, i64::MAX, 0.5).abs() <= 1);
        assert!(lerp_clamp(-1, i64::MAX, 0.999) > 0);
        let near_end = lerp_clamp(i64::MAX, i64::MIN, 0.999_999);
        assert!(near_end < i64::MIN / 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ramps_to_target() {
        let mut writes = Vec::new();
        let started = Instant::now();
        let task = FadeTask {
            param: Parameter::new(51, 0, 1),
            start: 0,
            target: 100,
            duration: Duration::from_millis(100),
            tick: DEFAULT_TICK,
        };

        task.run(|_, value| {
            writes.push((started.elapsed(), value));
            Ok(())
        })
        .await;

        assert_eq!(writes.len(), 10);
        assert!(writes.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(writes.last().map(|w| w.1), Some(100));
        assert_eq!(writes[0].1, 10);
        assert!(writes[0].0 >= DEFAULT_TICK);
        assert!(writes.iter().all(|w| w.0 <= Duration::from_millis(110)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_writes_target_once() {
        let mut writes = Vec::new();
        let task = FadeTask {
            param: Parameter::new(1, 0, 0),
            start: 5,
            target: -5,
            duration: Duration::ZERO,
            tick: DEFAULT_TICK,
        };
        task.run(|_, value| {
            writes.push(value);
            Ok(())
        })
        .await;
        assert_eq!(writes, vec![-5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_does_not_stop_ramp() {
        let mut calls = 0;
        let task = FadeTask {
            param: Parameter::new(1, 0, 0),
            start: 0,
            target: 10,
            duration: Duration::from_millis(30),
            tick: DEFAULT_TICK,
        };
        task.run(|_, _| {
            calls += 1;
            Err(Error::Transport(TransportError::Closed))
        })
        .await;
        assert_eq!(calls, 3);
    }
}
