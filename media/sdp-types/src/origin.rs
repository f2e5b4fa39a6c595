use crate::not_whitespace;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{digit1, space1};
use nom::combinator::{map, map_res};
use nom::error::context;
use nom::sequence::tuple;
use std::fmt;
use std::str::FromStr;

/// Origin field (`o=`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.2)
#[derive(Debug, Clone)]
pub struct Origin {
    pub username: BytesStr,
    pub session_id: u64,
    pub session_version: u64,
    pub address: BytesStr,
}

impl Origin {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "parsing origin",
            map(
                tuple((
                    take_while1(not_whitespace),
                    space1,
                    map_res(digit1, FromStr::from_str),
                    space1,
                    map_res(digit1, FromStr::from_str),
                    space1,
                    tag("IN"),
                    space1,
                    take_while1(not_whitespace),
                    space1,
                    take_while1(not_whitespace),
                )),
                |(username, _, session_id, _, session_version, _, _, _, _, _, address)| Origin {
                    username: BytesStr::from_parse(src, username),
                    session_id,
                    session_version,
                    address: BytesStr::from_parse(src, address),
                },
            ),
        )(i)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} IN IP4 {}",
            self.username, self.session_id, self.session_version, self.address
        )
    }
}
