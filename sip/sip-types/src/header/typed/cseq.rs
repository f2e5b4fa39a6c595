use crate::header::{ConstNamed, HeaderParse};
use crate::{Method, Name};
use bytes::Bytes;
use internal::IResult;
use nom::character::complete::{digit1, space1};
use nom::combinator::{map, map_res};
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::FromStr;

/// CSeq header: sequence number + request method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSeq {
    pub cseq: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(cseq: u32, method: Method) -> Self {
        Self { cseq, method }
    }
}

impl ConstNamed for CSeq {
    const NAME: Name = Name::CSEQ;
}

impl HeaderParse for CSeq {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            tuple((
                map_res(digit1, FromStr::from_str),
                preceded(space1, Method::parse(src)),
            )),
            |(cseq, method)| CSeq { cseq, method },
        )(i.trim())
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cseq, self.method)
    }
}
