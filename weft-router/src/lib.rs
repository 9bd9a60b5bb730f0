//! A minimal route matcher and static-file serving primitive: a plain
//! prefix + `{param}` + `*` matcher, leaving a richer router to application
//! code.
//!
//! Grounded in `armature-core/src/routing.rs`, `route_params.rs`, and
//! `static_assets.rs`, reworked to match without allocating a temporary
//! vector per lookup and against this workspace's own `Request`/`Writer`
//! types rather than the original's HTTP types.

pub mod matcher;
pub mod static_file;

pub use matcher::{Param, Params, Pattern, Router};
pub use static_file::{serve, Outcome, StaticFileConfig};
