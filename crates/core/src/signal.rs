//! Cooperative cancellation and process signal routing.
//!
//! Signals never touch outputs or audio directly. The listener only flips
//! the shared [`CancelToken`]; the supervisor notices it on its own thread
//! and performs the cleanup there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const SLEEP_SLICE: Duration = Duration::from_millis(10);

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in short slices, returning early on cancellation.
    ///
    /// Returns `true` if the full duration elapsed. A duration too long to
    /// represent as a deadline waits until cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    deadline - now
                }
                None => SLEEP_SLICE,
            };
            thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

/// Route SIGINT/SIGTERM (Ctrl-C elsewhere) into `token` from a task on `handle`.
pub fn spawn_signal_listener(handle: &Handle, token: CancelToken) -> JoinHandle<()> {
    handle.spawn(async move {
        loop {
            match shutdown_signal().await {
                Ok(name) if token.is_cancelled() => {
                    log::warn!("Received {} while already shutting down", name);
                }
                Ok(name) => {
                    log::warn!("Received {}, cleaning up", name);
                    token.cancel();
                }
                Err(e) => {
                    log::error!("Failed to listen for shutdown signals: {}", e);
                    return;
                }
            }
        }
    })
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
