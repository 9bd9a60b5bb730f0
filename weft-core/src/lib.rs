//! Shared runtime abstractions consumed by every protocol crate in the
//! `weft` stack: the abstract transport capability, task spawning, graceful
//! shutdown, per-connection extension storage, and the `Route` handler seam.

pub mod context;
pub mod graceful;
pub mod io;
pub mod rt;
pub mod service;

pub use context::{ConnectionId, Extensions};
pub use io::{AsyncIo, PrefixedIo, SharedIo, Transport};
pub use rt::Executor;
pub use service::{Connection, Route};
