//! Runtime utilities: task spawning and timeouts.
//!
//! The protocol engines in `weft-h1`/`weft-h2`/`weft-ws` never call
//! `tokio::spawn` directly — they go through an [`Executor`], so the crate
//! stays usable (in principle) under any executor that can produce one. Only
//! the bundled example binary commits to tokio.

use std::future::Future;
use std::time::Duration;
use tokio_graceful::ShutdownGuard;
use weft_types::WeftError;

/// Future executor used to spawn per-stream tasks.
///
/// Mirrors the pattern of pairing a plain `tokio::spawn` with an optional
/// graceful-shutdown guard: once a guard is registered, every spawned task
/// is tracked and awaited before the process exits.
#[derive(Default, Clone)]
pub struct Executor {
    guard: Option<ShutdownGuard>,
}

impl Executor {
    pub const fn new() -> Self {
        Self { guard: None }
    }

    pub fn graceful(guard: ShutdownGuard) -> Self {
        Self { guard: Some(guard) }
    }

    pub fn spawn_task<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match &self.guard {
            Some(guard) => guard.spawn_task(future),
            None => tokio::spawn(future),
        }
    }

    pub fn guard(&self) -> Option<&ShutdownGuard> {
        self.guard.as_ref()
    }
}

/// Awaits `fut`, converting a timeout into [`WeftError::RecvTimeout`].
///
/// A negative/absent `duration` (represented as `None`) means "no timeout":
/// the future is simply awaited in full, matching spec.md's
/// "negative = no timeout" convention for `recv_timeout`/`send_timeout`.
pub async fn recv_timeout<F, T>(duration: Option<Duration>, fut: F) -> Result<T, WeftError>
where
    F: Future<Output = T>,
{
    match duration {
        None => Ok(fut.await),
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| WeftError::RecvTimeout),
    }
}

/// As [`recv_timeout`], but maps to [`WeftError::SendTimeout`].
pub async fn send_timeout<F, T>(duration: Option<Duration>, fut: F) -> Result<T, WeftError>
where
    F: Future<Output = T>,
{
    match duration {
        None => Ok(fut.await),
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| WeftError::SendTimeout),
    }
}
