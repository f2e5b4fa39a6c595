use crate::header::{ConstNamed, HeaderParse};
use crate::Name;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use std::fmt;

/// Call-ID header
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(pub BytesStr);

impl CallId {
    pub fn new<V>(value: V) -> Self
    where
        V: Into<BytesStr>,
    {
        Self(value.into())
    }
}

impl ConstNamed for CallId {
    const NAME: Name = Name::CALL_ID;
}

impl HeaderParse for CallId {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        Ok(("", Self(BytesStr::from_parse(src, i.trim()))))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
