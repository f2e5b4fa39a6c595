use crate::header::{ConstNamed, HeaderParse};
use crate::uri::NameAddr;
use crate::Name;
use bytes::Bytes;
use internal::IResult;
use std::fmt;

/// Contact header, reduced to the single name-addr form this stack emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact(pub NameAddr);

impl Contact {
    pub fn new(addr: NameAddr) -> Self {
        Self(addr)
    }
}

impl ConstNamed for Contact {
    const NAME: Name = Name::CONTACT;
}

impl HeaderParse for Contact {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        let (i, addr) = NameAddr::parse(src)(i.trim())?;

        Ok((i, Self(addr)))
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
