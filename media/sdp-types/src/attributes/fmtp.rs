//! Fmtp attribute (`a=fmtp`)

use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::character::complete::{digit1, space1};
use nom::combinator::{map, map_res, rest};
use nom::error::context;
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::FromStr;

/// Format specific parameters for a payload type
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.15)
#[derive(Debug, Clone)]
pub struct Fmtp {
    pub payload: u8,
    pub params: BytesStr,
}

impl Fmtp {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "parsing fmtp",
            map(
                tuple((
                    map_res(digit1, FromStr::from_str),
                    preceded(space1, rest),
                )),
                |(payload, params)| Fmtp {
                    payload,
                    params: BytesStr::from_parse(src, params),
                },
            ),
        )(i)
    }
}

impl fmt::Display for Fmtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.payload, self.params)
    }
}
