//! Typed header representations, parsed on demand from raw header values

mod auth;
mod call_id;
mod common;
mod contact;
mod cseq;
mod from_to;
mod via;

pub use auth::{DigestAuthorization, DigestChallenge, QopResponse};
pub use call_id::CallId;
pub use common::{ContentLength, ContentType, MaxForwards};
pub use contact::Contact;
pub use cseq::CSeq;
pub use from_to::FromTo;
pub use via::Via;
