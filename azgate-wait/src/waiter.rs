//! The wait loop.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::outcome::{PollResult, WaitOutcome};
use crate::spec::{StateClass, WaitSpec};

/// What cut a pause short.
enum Interrupt {
    Cancelled,
    Deadline,
}

/// Poll `poll` until the observed state reaches the target of `spec`.
///
/// Polls run strictly one after another. Each decision is taken on the most
/// recent observation only:
///
/// - target state: [`WaitOutcome::Success`]
/// - pending state: sleep for the next interval and poll again
/// - any other state: [`WaitOutcome::Failure`], no further polls
/// - poll error: [`WaitOutcome::PollError`], no retry
///
/// The timeout is measured from the call. Once it passes no new poll is
/// issued and an in-flight poll is abandoned. `cancel` is checked before
/// every poll and interrupts both in-flight polls and sleeps.
pub async fn wait<T, E, F, Fut>(
    mut poll: F,
    spec: &WaitSpec,
    cancel: &CancellationToken,
) -> WaitOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T, E>>,
{
    let start = Instant::now();
    // A timeout too large to represent never expires.
    let deadline = start.checked_add(spec.timeout());
    let mut last_state: Option<String> = None;
    let mut attempt: u32 = 0;

    if !spec.initial_delay().is_zero() {
        if let Some(interrupt) = pause(spec.initial_delay(), deadline, cancel).await {
            return interrupted(interrupt, start, last_state, attempt);
        }
    }

    loop {
        if cancel.is_cancelled() {
            return interrupted(Interrupt::Cancelled, start, last_state, attempt);
        }

        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return interrupted(Interrupt::Cancelled, start, last_state, attempt);
            }
            result = poll() => result,
            _ = expire(deadline) => {
                return interrupted(Interrupt::Deadline, start, last_state, attempt);
            }
        };

        let observed = match result {
            Ok(observed) => observed,
            Err(e) => {
                warn!(attempt, "Failed to poll state, giving up");
                return WaitOutcome::PollError(e);
            }
        };

        match spec.classify(&observed.state) {
            StateClass::Target => {
                info!(
                    attempt,
                    state = %observed.state,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Reached target state"
                );
                return WaitOutcome::Success(observed.raw);
            }
            StateClass::Pending => {
                debug!(
                    attempt,
                    state = %observed.state,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Still pending"
                );
            }
            StateClass::Other => {
                warn!(
                    attempt,
                    state = %observed.state,
                    target = %spec.target(),
                    "Left pending states without reaching target"
                );
                return WaitOutcome::Failure {
                    state: observed.state,
                    raw: observed.raw,
                };
            }
        }

        last_state = Some(observed.state);

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return interrupted(Interrupt::Deadline, start, last_state, attempt);
        }

        let interval = spec.backoff().interval(attempt - 1);
        if let Some(interrupt) = pause(interval, deadline, cancel).await {
            return interrupted(interrupt, start, last_state, attempt);
        }
    }
}

/// [`wait`] without a cancellation source.
pub async fn wait_for_state<T, E, F, Fut>(poll: F, spec: &WaitSpec) -> WaitOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T, E>>,
{
    wait(poll, spec, &CancellationToken::new()).await
}

/// Resolves at `deadline`, or never when there is none.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Sleep for `duration` unless cancelled or the deadline comes first.
async fn pause(
    duration: Duration,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> Option<Interrupt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(Interrupt::Cancelled),
        _ = expire(deadline) => Some(Interrupt::Deadline),
        _ = sleep(duration) => None,
    }
}

fn interrupted<T, E>(
    interrupt: Interrupt,
    start: Instant,
    last_state: Option<String>,
    attempts: u32,
) -> WaitOutcome<T, E> {
    let elapsed = start.elapsed();
    match interrupt {
        Interrupt::Cancelled => {
            info!(attempts, elapsed_ms = elapsed.as_millis() as u64, "Wait cancelled");
            WaitOutcome::Cancelled
        }
        Interrupt::Deadline => {
            warn!(
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                last_state = last_state.as_deref().unwrap_or("none"),
                "Timed out waiting for target state"
            );
            WaitOutcome::Timeout {
                elapsed,
                last_state,
            }
        }
    }
}
