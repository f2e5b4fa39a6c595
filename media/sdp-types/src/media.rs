use crate::not_whitespace;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while1;
use nom::character::complete::{digit1, space1};
use nom::combinator::{map, map_res};
use nom::error::context;
use nom::multi::many0;
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Video,
    Other(BytesStr),
}

impl MediaType {
    fn from_parse(src: &Bytes, slice: &str) -> Self {
        match slice {
            "audio" => MediaType::Audio,
            "video" => MediaType::Video,
            _ => MediaType::Other(BytesStr::from_parse(src, slice)),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Audio => f.write_str("audio"),
            MediaType::Video => f.write_str("video"),
            MediaType::Other(other) => f.write_str(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportProtocol {
    RtpAvp,
    Other(BytesStr),
}

impl TransportProtocol {
    fn from_parse(src: &Bytes, slice: &str) -> Self {
        match slice {
            "RTP/AVP" => TransportProtocol::RtpAvp,
            _ => TransportProtocol::Other(BytesStr::from_parse(src, slice)),
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportProtocol::RtpAvp => f.write_str("RTP/AVP"),
            TransportProtocol::Other(other) => f.write_str(other),
        }
    }
}

/// Media field (`m=`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.14)
#[derive(Debug, Clone)]
pub struct Media {
    pub media_type: MediaType,
    pub port: u16,
    pub proto: TransportProtocol,

    /// Offered payload type numbers
    pub fmts: Vec<u8>,
}

impl Media {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "parsing media",
            map(
                tuple((
                    take_while1(not_whitespace),
                    space1,
                    map_res(digit1, FromStr::from_str),
                    space1,
                    take_while1(not_whitespace),
                    many0(preceded(space1, map_res(digit1, FromStr::from_str))),
                )),
                |(media_type, _, port, _, proto, fmts)| Media {
                    media_type: MediaType::from_parse(src, media_type),
                    port,
                    proto: TransportProtocol::from_parse(src, proto),
                    fmts,
                },
            ),
        )(i)
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.media_type, self.port, self.proto)?;

        for fmt in &self.fmts {
            write!(f, " {fmt}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn media() {
        let input = BytesStr::from_static("audio 4000 RTP/AVP 0 8 101");

        let (rem, media) = Media::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(media.media_type, MediaType::Audio);
        assert_eq!(media.port, 4000);
        assert_eq!(media.proto, TransportProtocol::RtpAvp);
        assert_eq!(media.fmts, [0, 8, 101]);
    }

    #[test]
    fn media_print() {
        let media = Media {
            media_type: MediaType::Audio,
            port: 10020,
            proto: TransportProtocol::RtpAvp,
            fmts: vec![0, 8, 101],
        };

        assert_eq!(media.to_string(), "audio 10020 RTP/AVP 0 8 101");
    }
}
