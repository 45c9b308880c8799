//! Error types used by the billboard runtime, its plugins and configuration.
//!
//! - [`RuntimeError`]: errors raised by the actor runtime itself (sending to a
//!   terminated task, submitting to a shut-down pool, shutdown grace exceeded).
//! - [`StateError`]: protocol violations on an [`ActivePlugin`](crate::ActivePlugin)
//!   record. These indicate a broken invariant and are surfaced loudly.
//! - [`ConfigError`]: configuration provider and validation failures.
//! - [`WorkError`]: failure of one unit of asynchronous work.
//! - [`PluginError`]: errors returned from plugin lifecycle hooks.
//!
//! Every enum provides `as_label` for logs.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the actor runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A message was sent to a task that has already processed `Quit`.
    #[error("task '{task}' has terminated; send rejected")]
    IllegalState {
        /// Name of the terminated task.
        task: String,
    },

    /// The timer service was shut down; no new timers are accepted.
    #[error("timer service is shut down")]
    TimerShutdown,

    /// The worker pool was shut down; no new work is accepted.
    #[error("worker pool '{pool}' is shut down")]
    PoolShutdown {
        /// Name of the pool.
        pool: String,
    },

    /// Shutdown grace period was exceeded; some tasks did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use billboard::RuntimeError;
    ///
    /// let err = RuntimeError::IllegalState { task: "scheduler".into() };
    /// assert_eq!(err.as_label(), "runtime_illegal_state");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::IllegalState { .. } => "runtime_illegal_state",
            RuntimeError::TimerShutdown => "runtime_timer_shutdown",
            RuntimeError::PoolShutdown { .. } => "runtime_pool_shutdown",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Protocol violations on an active-plugin record.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The operation is not allowed in the record's current state.
    #[error("'{op}' is not allowed while {state}")]
    InvalidState {
        /// Operation that was attempted.
        op: &'static str,
        /// State the record was in.
        state: &'static str,
    },

    /// The record was shut down; no further transitions are accepted.
    #[error("'{op}' rejected: record is terminated")]
    Terminated {
        /// Operation that was attempted.
        op: &'static str,
    },

    /// The underlying worker pool refused the submission.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl StateError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::InvalidState { .. } => "state_invalid",
            StateError::Terminated { .. } => "state_terminated",
            StateError::Runtime(e) => e.as_label(),
        }
    }
}

/// # Configuration provider and validation errors.
///
/// `NotFound` and `Malformed` are kept apart so callers can tell a missing
/// document from a broken one.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The requested document or plugin does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of what was missing.
        what: String,
    },

    /// The document exists but could not be parsed.
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// Description of the document.
        what: String,
        /// Parser message.
        reason: String,
    },

    /// Documents parsed but failed validation; every issue is reported.
    #[error("invalid configuration: {}", issues.join("; "))]
    Invalid {
        /// Human-readable validation issues.
        issues: Vec<String>,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NotFound { .. } => "config_not_found",
            ConfigError::Malformed { .. } => "config_malformed",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }

    pub(crate) fn malformed(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ConfigError::Malformed {
            what: what.into(),
            reason: err.to_string(),
        }
    }
}

/// # Failure of one unit of asynchronous work.
///
/// Cloneable so it can travel inside a `FutureCompleted` message that is fanned
/// out to several recipients.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    /// The work returned an error.
    #[error("work failed: {0}")]
    Failed(String),

    /// The work panicked; the panic was contained.
    #[error("work panicked: {0}")]
    Panicked(String),

    /// The work observed cancellation and gave up.
    #[error("work cancelled")]
    Cancelled,
}

impl WorkError {
    /// Wraps any displayable error as [`WorkError::Failed`].
    pub fn failed(err: impl std::fmt::Display) -> Self {
        WorkError::Failed(err.to_string())
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Failed(_) => "work_failed",
            WorkError::Panicked(_) => "work_panicked",
            WorkError::Cancelled => "work_cancelled",
        }
    }
}

/// # Errors returned by plugin lifecycle hooks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PluginError {
    /// The hook failed.
    #[error("plugin failed: {0}")]
    Failed(String),

    /// The hook violated the active-plugin protocol (e.g. submitted work while sleeping).
    #[error(transparent)]
    State(#[from] StateError),

    /// The hook could not schedule a timer.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl PluginError {
    /// Wraps any displayable error as [`PluginError::Failed`].
    pub fn failed(err: impl std::fmt::Display) -> Self {
        PluginError::Failed(err.to_string())
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PluginError::Failed(_) => "plugin_failed",
            PluginError::State(e) => e.as_label(),
            PluginError::Runtime(e) => e.as_label(),
        }
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(RuntimeError::TimerShutdown.as_label(), "runtime_timer_shutdown");
        assert_eq!(
            StateError::InvalidState { op: "submit_async", state: "sleeping" }.as_label(),
            "state_invalid"
        );
        assert_eq!(
            ConfigError::NotFound { what: "master".into() }.as_label(),
            "config_not_found"
        );
        assert_eq!(WorkError::Cancelled.as_label(), "work_cancelled");
    }

    #[test]
    fn invalid_lists_every_issue() {
        let err = ConfigError::Invalid {
            issues: vec!["a overlaps b".into(), "c overlaps d".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration: a overlaps b; c overlaps d"
        );
    }

    #[test]
    fn panic_message_handles_both_string_kinds() {
        let a: Box<dyn std::any::Any + Send> = Box::new("static");
        let b: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(a.as_ref()), "static");
        assert_eq!(panic_message(b.as_ref()), "owned");
        assert_eq!(panic_message(c.as_ref()), "unknown panic");
    }
}
