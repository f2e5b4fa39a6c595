#![warn(unreachable_pub)]

mod attributes;
mod connection;
mod media;
mod media_description;
mod origin;
mod parser;
mod session_description;

pub use attributes::{Direction, Fmtp, RtpMap, Ssrc, UnknownAttribute};
pub use connection::Connection;
pub use media::{Media, MediaType, TransportProtocol};
pub use media_description::MediaDescription;
pub use origin::Origin;
pub use parser::ParseSessionDescriptionError;
pub use session_description::SessionDescription;

fn not_whitespace(c: char) -> bool {
    !c.is_ascii_whitespace()
}
