//! Guarded plugin hook calls.
//!
//! Hooks run on the owning actor's task. A hook that returns an error or
//! panics is logged here and reported to the caller as a description; it never
//! unwinds into the actor loop.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::error::{PluginError, panic_message};

/// Runs one hook call, containing errors and panics.
pub(crate) fn call_hook<F>(plugin: &str, hook: &'static str, f: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), PluginError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(plugin, hook, error = %e, label = e.as_label(), "plugin hook failed");
            Err(e.to_string())
        }
        Err(p) => {
            let msg = panic_message(p.as_ref());
            error!(plugin, hook, panic = %msg, "plugin hook panicked");
            Err(format!("hook '{hook}' panicked: {msg}"))
        }
    }
}
