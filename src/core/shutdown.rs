//! # Cross-platform OS signal handling.
//!
//! [`wait_for_signal`] completes when the process receives a termination
//! signal and reports which one.
//!
//! ## Signals
//! **Unix platforms:** `SIGINT` (Ctrl-C), `SIGTERM`, `SIGQUIT`.
//!
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`].

/// Waits for a termination signal and returns its name.
///
/// Returns `Err` if the signal handlers cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for a termination signal and returns its name.
///
/// Returns `Err` if the signal handler cannot be registered.
#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
