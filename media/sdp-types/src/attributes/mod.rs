use bytes::Bytes;
use bytesstr::BytesStr;
use std::fmt;

mod fmtp;
mod rtpmap;
mod ssrc;

pub use fmtp::Fmtp;
pub use rtpmap::RtpMap;
pub use ssrc::Ssrc;

/// Media direction attribute (`a=sendrecv` and friends)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    #[default]
    SendRecv,
    RecvOnly,
    SendOnly,
    Inactive,
}

impl Direction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sendrecv" => Some(Direction::SendRecv),
            "recvonly" => Some(Direction::RecvOnly),
            "sendonly" => Some(Direction::SendOnly),
            "inactive" => Some(Direction::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::SendRecv => f.write_str("sendrecv"),
            Direction::RecvOnly => f.write_str("recvonly"),
            Direction::SendOnly => f.write_str("sendonly"),
            Direction::Inactive => f.write_str("inactive"),
        }
    }
}

/// Attribute this library doesn't know about. Kept as-is so it survives a
/// parse/print round trip.
#[derive(Debug, Clone)]
pub struct UnknownAttribute {
    pub name: BytesStr,
    pub value: Option<BytesStr>,
}

impl UnknownAttribute {
    pub fn parse(src: &Bytes, line: &str) -> Self {
        match line.split_once(':') {
            Some((name, value)) => Self {
                name: BytesStr::from_parse(src, name),
                value: Some(BytesStr::from_parse(src, value)),
            },
            None => Self {
                name: BytesStr::from_parse(src, line),
                value: None,
            },
        }
    }
}

impl fmt::Display for UnknownAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={}", self.name)?;

        if let Some(value) = &self.value {
            write!(f, ":{value}")?;
        }

        Ok(())
    }
}
