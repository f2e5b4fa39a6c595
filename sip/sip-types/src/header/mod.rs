//! Contains everything header related

use bytes::Bytes;
use internal::IResult;
use name::Name;

pub mod headers;
pub mod typed;

pub(crate) mod name;

/// Assign a constant header name to a type.
///
/// Is used by [`Headers`](headers::Headers)'s `(get/insert)_named` API so no
/// name has to be provided by the caller.
pub trait ConstNamed {
    const NAME: Name;
}

/// Decode a typed header from a single raw header value.
pub trait HeaderParse: Sized {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self>;
}

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("missing header {0}")]
    Missing(Name),
    #[error("malformed header {0}")]
    Malformed(Name),
}

macro_rules! from_str_header {
    ($(#[$meta:meta])* $struct_name:ident, $header_name:expr, $from_str_ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $struct_name(pub $from_str_ty);

        impl $crate::header::ConstNamed for $struct_name {
            const NAME: $crate::Name = $header_name;
        }

        impl $crate::header::HeaderParse for $struct_name {
            fn parse<'i>(
                _: &bytes::Bytes,
                i: &'i str,
            ) -> internal::IResult<&'i str, Self> {
                use nom::combinator::map_res;

                let (i, o) = map_res(internal::identity(), |x: &str| x.parse())(i.trim())?;

                Ok((i, Self(o)))
            }
        }

        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

pub(crate) use from_str_header;
