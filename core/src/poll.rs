//! Bounded fixed-interval polling.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;

/// What a single poll step decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick<T> {
    /// Stop polling with this value.
    Ready(T),
    /// Poll again right away.
    Again,
    /// Sleep one interval, then poll again.
    Wait,
}

/// Repeats a step until it is ready or the deadline passes.
///
/// The deadline is measured from the start of [`Poller::run`] and covers
/// everything the step does, including its own I/O: a step still pending
/// when the deadline passes is dropped. Sleeps are clamped to the time
/// remaining so the loop never oversleeps the deadline.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Poller {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Returns `Ok(None)` when the deadline expires before the step is ready.
    pub async fn run<C, T, E, F, Fut>(&self, clock: &C, mut step: F) -> Result<Option<T>, E>
    where
        C: Clock + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Tick<T>, E>>,
    {
        let started = clock.now();
        let elapsed = || clock.now().saturating_sub(started);

        while elapsed() < self.deadline {
            // The step itself is bounded by the time left; an overrun ends the loop.
            let remaining = self.deadline.saturating_sub(elapsed());
            let tick = tokio::select! {
                biased;
                tick = step() => Some(tick),
                _ = clock.sleep(remaining) => None,
            };
            let Some(tick) = tick else {
                debug!(?remaining, "Poll step overran the deadline");
                return Ok(None);
            };

            match tick? {
                Tick::Ready(value) => return Ok(Some(value)),
                Tick::Again => {}
                Tick::Wait => {
                    let remaining = self.deadline.saturating_sub(elapsed());
                    clock.sleep(self.interval.min(remaining)).await;
                }
            }
        }

        Ok(None)
    }
}
