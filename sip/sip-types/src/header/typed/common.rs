use crate::header::{from_str_header, ConstNamed, HeaderParse};
use crate::Name;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use std::fmt;

from_str_header! {
    /// Content-Length header
    ContentLength, Name::CONTENT_LENGTH, usize
}

from_str_header! {
    /// Max-Forwards header
    MaxForwards, Name::MAX_FORWARDS, u32
}

/// Content-Type header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType(pub BytesStr);

impl ContentType {
    pub const fn from_static(value: &'static str) -> Self {
        Self(BytesStr::from_static(value))
    }
}

impl ConstNamed for ContentType {
    const NAME: Name = Name::CONTENT_TYPE;
}

impl HeaderParse for ContentType {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        Ok(("", Self(BytesStr::from_parse(src, i.trim()))))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_length() {
        let src = Bytes::from_static(b" 349 ");

        let (_, content_length) = ContentLength::parse(&src, " 349 ").unwrap();

        assert_eq!(content_length.0, 349);
        assert_eq!(content_length.to_string(), "349");
    }
}
