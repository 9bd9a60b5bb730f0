//! Shared wire-level HTTP types used by every protocol crate in the `weft`
//! stack: an insertion-ordered header map, the method/status/version enums,
//! request/response message framing, and the unified error taxonomy.

pub mod error;
pub mod headers;
pub mod message;
pub mod method;
pub mod status;
pub mod version;

pub use error::{CloseCode, Reason, WeftError};
pub use headers::HeaderMap;
pub use message::{Message, Request, RequestHeader, Response, ResponseHeader};
pub use method::Method;
pub use status::StatusCode;
pub use version::Version;
