//! Ssrc attribute (`a=ssrc`)

use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::character::complete::{digit1, space1};
use nom::combinator::{map, map_res, opt, rest};
use nom::error::context;
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::FromStr;

/// Synchronization source attribute, optionally carrying a source-level
/// attribute like `cname:...`
///
/// [RFC5576](https://www.rfc-editor.org/rfc/rfc5576.html#section-4.1)
#[derive(Debug, Clone)]
pub struct Ssrc {
    pub ssrc: u32,
    pub attribute: Option<BytesStr>,
}

impl Ssrc {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "parsing ssrc",
            map(
                tuple((
                    map_res(digit1, FromStr::from_str),
                    opt(preceded(space1, rest)),
                )),
                |(ssrc, attribute)| Ssrc {
                    ssrc,
                    attribute: attribute.map(|attribute| BytesStr::from_parse(src, attribute)),
                },
            ),
        )(i)
    }
}

impl fmt::Display for Ssrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ssrc)?;

        if let Some(attribute) = &self.attribute {
            write!(f, " {attribute}")?;
        }

        Ok(())
    }
}
