use crate::header::HeaderParse;
use crate::uri::{NameAddr, Params};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use std::fmt;

/// Representation of a From or To header.
///
/// The `tag` parameter is pulled out of the generic parameter list since the
/// dialog layer works with it constantly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromTo {
    pub addr: NameAddr,
    pub tag: Option<BytesStr>,
    pub params: Params,
}

impl FromTo {
    pub fn new(addr: NameAddr, tag: Option<BytesStr>) -> Self {
        Self {
            addr,
            tag,
            params: Params::new(),
        }
    }
}

impl HeaderParse for FromTo {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        let (i, addr) = NameAddr::parse(src)(i.trim())?;
        let (i, mut params) = Params::parse(src)(i)?;

        let tag = params.take("tag").flatten();

        Ok((i, Self { addr, tag, params }))
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)?;

        if let Some(tag) = &self.tag {
            write!(f, ";tag={tag}")?;
        }

        self.params.fmt(f)
    }
}
