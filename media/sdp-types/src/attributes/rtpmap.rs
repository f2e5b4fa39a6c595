//! RtpMap attribute (`a=rtpmap`)

use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit1, space1};
use nom::combinator::{map, map_res, opt, rest};
use nom::error::context;
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::FromStr;

/// Maps an RTP payload number from the media description to an encoding.
///
/// Media-Level attribute
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.6)
#[derive(Debug, Clone)]
pub struct RtpMap {
    /// The number used in the media description which this maps a description to
    pub payload: u8,

    /// Name of the encoding
    pub encoding: BytesStr,

    /// Clock rate of the encoding
    pub clock_rate: u32,

    /// Additional parameters as a string, usually the channel count
    pub params: Option<BytesStr>,
}

impl RtpMap {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "parsing rtpmap",
            map(
                tuple((
                    map_res(digit1, FromStr::from_str),
                    preceded(space1, take_while1(|c| c != '/')),
                    preceded(char('/'), map_res(digit1, FromStr::from_str)),
                    opt(preceded(char('/'), rest)),
                )),
                |(payload, encoding, clock_rate, params)| RtpMap {
                    payload,
                    encoding: BytesStr::from_parse(src, encoding),
                    clock_rate,
                    params: params.map(|params| BytesStr::from_parse(src, params)),
                },
            ),
        )(i)
    }
}

impl fmt::Display for RtpMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.payload, self.encoding, self.clock_rate)?;

        if let Some(params) = &self.params {
            write!(f, "/{params}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rtpmap() {
        let input = BytesStr::from_static("0 PCMU/8000");

        let (rem, rtpmap) = RtpMap::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(rtpmap.payload, 0);
        assert_eq!(rtpmap.encoding, "PCMU");
        assert_eq!(rtpmap.clock_rate, 8000);
        assert_eq!(rtpmap.params, None);
    }

    #[test]
    fn rtpmap_telephone_event() {
        let input = BytesStr::from_static("101 telephone-event/8000");

        let (_, rtpmap) = RtpMap::parse(input.as_ref(), &input).unwrap();

        assert_eq!(rtpmap.payload, 101);
        assert_eq!(rtpmap.encoding, "telephone-event");
    }

    #[test]
    fn rtpmap_channels() {
        let input = BytesStr::from_static("8 PCMA/8000/1");

        let (_, rtpmap) = RtpMap::parse(input.as_ref(), &input).unwrap();

        assert_eq!(rtpmap.params.unwrap(), "1");
    }

    #[test]
    fn rtpmap_print() {
        let rtpmap = RtpMap {
            payload: 0,
            encoding: "PCMU".into(),
            clock_rate: 8000,
            params: None,
        };

        assert_eq!(rtpmap.to_string(), "0 PCMU/8000");
    }
}
