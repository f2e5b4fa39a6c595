use crate::parse::token;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while1;
use nom::combinator::map;
use std::fmt;

/// Represents a SIP-Method.
///
/// The methods this stack works with are available as constants, anything
/// else ends up in the `Other` representation.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Method(Repr);

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
enum Repr {
    Invite,
    Ack,
    Cancel,
    Bye,
    Options,
    Other(BytesStr),
}

impl Method {
    pub const INVITE: Method = Method(Repr::Invite);
    pub const ACK: Method = Method(Repr::Ack);
    pub const CANCEL: Method = Method(Repr::Cancel);
    pub const BYE: Method = Method(Repr::Bye);
    pub const OPTIONS: Method = Method(Repr::Options);

    pub fn from_parse(src: &Bytes, slice: &str) -> Self {
        if slice.eq_ignore_ascii_case("INVITE") {
            Method::INVITE
        } else if slice.eq_ignore_ascii_case("ACK") {
            Method::ACK
        } else if slice.eq_ignore_ascii_case("CANCEL") {
            Method::CANCEL
        } else if slice.eq_ignore_ascii_case("BYE") {
            Method::BYE
        } else if slice.eq_ignore_ascii_case("OPTIONS") {
            Method::OPTIONS
        } else {
            Method(Repr::Other(BytesStr::from_parse(src, slice)))
        }
    }

    pub fn as_str(&self) -> &str {
        match &self.0 {
            Repr::Invite => "INVITE",
            Repr::Ack => "ACK",
            Repr::Cancel => "CANCEL",
            Repr::Bye => "BYE",
            Repr::Options => "OPTIONS",
            Repr::Other(other) => other,
        }
    }

    pub fn parse<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| map(take_while1(token), |slice| Self::from_parse(src, slice))(i)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        let s = BytesStr::from(s);

        Self::from_parse(s.as_ref(), s.as_ref())
    }
}
