//! Backoff scheduling
//!
//! Turns a resolved retry policy into a bounded, cancellable loop around an
//! action's evaluation.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::api::{Evaluable, Outcome, Retry};
use crate::common::Result;
use crate::context::RunContext;

pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ELAPSED_TIME: Duration = Duration::from_secs(15 * 60);

/// Exponentially growing, randomized delays
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    pub max_interval: Duration,
    /// Stop producing delays once this much time has passed since creation
    pub max_elapsed_time: Option<Duration>,
    current: Duration,
    started: Instant,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_elapsed_time: Some(DEFAULT_MAX_ELAPSED_TIME),
            current: DEFAULT_INITIAL_INTERVAL,
            started: Instant::now(),
        }
    }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the sequence from the initial interval
    pub fn reset(&mut self) {
        self.current = self.initial_interval;
        self.started = Instant::now();
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = randomize(self.current, self.randomization_factor);
        if let Some(max) = self.max_elapsed_time {
            if self.started.elapsed() + delay > max {
                return None;
            }
        }
        let next = self.current.as_secs_f64() * self.multiplier;
        self.current = if next >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            Duration::from_secs_f64(next)
        };
        Some(delay)
    }
}

/// A value drawn uniformly from `interval ± factor * interval`
fn randomize(interval: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return interval;
    }
    let secs = interval.as_secs_f64();
    let delta = factor * secs;
    let (low, high) = (secs - delta, secs + delta);
    if high <= low {
        return interval;
    }
    Duration::from_secs_f64(rand::rng().random_range(low..=high))
}

/// Delay sequence between attempts
#[derive(Debug, Clone)]
pub enum Backoff {
    Constant(Duration),
    Exponential(ExponentialBackoff),
}

impl Backoff {
    /// The sequence for `retry`, using `default_interval` for constant
    /// policies without an interval
    pub fn for_policy(retry: &Retry, default_interval: Duration) -> Self {
        if retry.exponential {
            Backoff::Exponential(ExponentialBackoff::new())
        } else {
            Backoff::Constant(retry.interval.unwrap_or(default_interval))
        }
    }

    /// The delay before the next attempt, `None` when the sequence is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        match self {
            Backoff::Constant(d) => Some(*d),
            Backoff::Exponential(exp) => exp.next_delay(),
        }
    }
}

/// Evaluate `action` under `retry`
///
/// Without a policy the action is evaluated exactly once. With one it is
/// evaluated until an outcome has no failures, the attempts bound is
/// reached, the delay sequence runs out, or the context is cancelled. A
/// fault from any evaluation is returned immediately.
pub async fn execute(ctx: &RunContext, action: &dyn Evaluable, retry: Option<&Retry>) -> Result<Outcome> {
    let Some(retry) = retry else {
        let outcome = action.eval(ctx).await?;
        ctx.debug(format!("single-shot (no retries) ok: {}", !outcome.failed()));
        return Ok(outcome);
    };

    let mut backoff = Backoff::for_policy(retry, ctx.settings().retry_interval);
    let start = Instant::now();
    let mut attempt: u32 = 1;
    loop {
        let outcome = action.eval(ctx).await?;
        let ok = !outcome.failed();
        ctx.debug(format!(
            "attempt {} after {:?} ok: {}",
            attempt,
            start.elapsed(),
            ok
        ));
        if ok {
            return Ok(outcome);
        }
        for failure in outcome.failures() {
            ctx.debug(format!("attempt {} failure: {}", attempt, failure));
        }

        if retry.attempts.is_some_and(|max| attempt >= max) {
            ctx.debug(format!("exceeded max attempts {}. stopping.", attempt));
            return Ok(outcome);
        }
        let Some(delay) = backoff.next_delay() else {
            ctx.debug("backoff exhausted. stopping.");
            return Ok(outcome);
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.cancellation().cancelled() => {
                ctx.debug("cancelled. stopping.");
                return Ok(outcome);
            }
        }
        attempt += 1;
    }
}
