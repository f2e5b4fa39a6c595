use crate::not_whitespace;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::space1;
use nom::combinator::map;
use nom::error::context;
use nom::sequence::tuple;
use std::fmt;

/// Connection field (`c=`)
///
/// Only the address is kept, any ttl/range suffix is stripped.
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.7)
#[derive(Debug, Clone)]
pub struct Connection {
    pub address: BytesStr,
}

impl Connection {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "parsing connection",
            map(
                tuple((
                    tag("IN"),
                    space1,
                    take_while1(not_whitespace),
                    space1,
                    take_while1(|c: char| not_whitespace(c) && c != '/'),
                )),
                |(_, _, _, _, address)| Connection {
                    address: BytesStr::from_parse(src, address),
                },
            ),
        )(i)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IN IP4 {}", self.address)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connection() {
        let input = BytesStr::from_static("IN IP4 203.0.113.7");

        let (rem, connection) = Connection::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(connection.address, "203.0.113.7");
    }

    #[test]
    fn connection_with_ttl() {
        let input = BytesStr::from_static("IN IP4 233.252.0.1/127");

        let (_, connection) = Connection::parse(input.as_ref(), &input).unwrap();

        assert_eq!(connection.address, "233.252.0.1");
    }
}
