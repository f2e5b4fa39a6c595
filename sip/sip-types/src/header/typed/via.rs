use crate::header::{ConstNamed, HeaderParse};
use crate::uri::Params;
use crate::Name;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::space1;
use nom::combinator::map;
use nom::sequence::tuple;
use std::fmt;

fn sent_by_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | ':' | '[' | ']')
}

/// A single Via header entry.
///
/// The topmost Via of a message is the most recent hop. Requests built by
/// this stack carry `rport`, a `z9hG4bK`-prefixed branch and `alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    /// Transport token as printed after `SIP/2.0/`, e.g. `UDP`
    pub transport: BytesStr,

    /// `host[:port]` this hop sent from
    pub sent_by: BytesStr,

    pub params: Params,
}

impl Via {
    pub fn new<T, S>(transport: T, sent_by: S, branch: BytesStr) -> Self
    where
        T: Into<BytesStr>,
        S: Into<BytesStr>,
    {
        let mut params = Params::new();
        params.push("rport", None);
        params.push("branch", Some(branch));
        params.push("alias", None);

        Self {
            transport: transport.into(),
            sent_by: sent_by.into(),
            params,
        }
    }

    pub fn branch(&self) -> Option<&BytesStr> {
        self.params.get_value("branch")
    }

    /// The `rport` parameter value, filled in by the server on responses
    pub fn rport(&self) -> Option<u16> {
        self.params
            .get_value("rport")
            .and_then(|rport| rport.parse().ok())
    }

    /// The `received` parameter, the source address the server saw
    pub fn received(&self) -> Option<&BytesStr> {
        self.params.get_value("received")
    }
}

impl ConstNamed for Via {
    const NAME: Name = Name::VIA;
}

impl HeaderParse for Via {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            tuple((
                tag_no_case("SIP/2.0/"),
                take_while1(|c: char| c.is_ascii_alphanumeric()),
                space1,
                take_while1(sent_by_char),
                Params::parse(src),
            )),
            |(_, transport, _, sent_by, params)| Via {
                transport: BytesStr::from_parse(src, transport),
                sent_by: BytesStr::from_parse(src, sent_by),
                params,
            },
        )(i.trim())
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}{}", self.transport, self.sent_by, self.params)
    }
}
