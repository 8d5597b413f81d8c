//! azgate-wait: convergence waiter for asynchronously provisioned resources.
//!
//! After a mutation is submitted to a remote control plane, the resource moves
//! through a series of provisioning states before it settles. [`wait`] polls
//! the current state and classifies every observation as one of:
//!
//! - the **target** state: the wait succeeds with the last payload
//! - a **pending** state: the resource is still converging, poll again
//! - anything else: the resource settled somewhere unexpected, the wait fails
//!
//! The waiter knows nothing about the resource it is watching. Callers supply
//! the poll function and a [`WaitSpec`] holding the state labels, timeout and
//! poll interval, and attach resource identity to their own log spans.
//!
//! # Example
//! ```ignore
//! use std::time::Duration;
//! use azgate_wait::{Observed, WaitSpec, wait};
//! use tokio_util::sync::CancellationToken;
//!
//! let spec = WaitSpec::builder("Succeeded")
//!     .pending(["Accepted", "Updating"])
//!     .timeout(Duration::from_secs(600))
//!     .poll_interval(Duration::from_secs(5))
//!     .build()?;
//!
//! let outcome = wait(
//!     || async {
//!         let gw = client.get(&rg, &name).await?;
//!         Ok(Observed::new(gw.provisioning_state(), gw))
//!     },
//!     &spec,
//!     &CancellationToken::new(),
//! )
//! .await;
//! ```

mod outcome;
mod spec;
mod waiter;

pub use outcome::{Observed, PollResult, WaitError, WaitOutcome};
pub use spec::{
    Backoff, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, SpecError, StateClass, WaitSpec,
    WaitSpecBuilder,
};
pub use waiter::{wait, wait_for_state};

// Re-exported so callers don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
