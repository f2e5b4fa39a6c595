#![warn(unreachable_pub)]
//! SIP message types with parsing & serialization.
//!
//! The message model is a start line plus an ordered multimap of headers and
//! an opaque body. Typed headers live in [`header::typed`] and are parsed on
//! demand from the raw header values.

pub mod header;
pub mod msg;
pub mod uri;

mod method;
mod parse;
mod status;

pub use header::headers::Headers;
pub use header::name::Name;
pub use header::HeaderError;
pub use method::Method;
pub use status::{CodeKind, StatusCode};
