//! Graceful-shutdown primitives, re-exported from `tokio-graceful` exactly
//! as `rama-core::graceful` does: infrastructure this crate consumes rather
//! than reimplements.

pub use tokio_graceful::{default_signal, Shutdown, ShutdownBuilder, ShutdownGuard, WeakShutdownGuard};
