//! SIP URIs and name-addr types

use crate::parse::{host_char, parse_quoted, token, whitespace};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res, opt};
use nom::sequence::{delimited, preceded, terminated, tuple};
use std::fmt;
use std::str::FromStr;

mod params;

pub use params::{Param, Params};

/// A `sip:` / `sips:` URI
///
/// Only the parts this stack works with are modelled: user, host, port and
/// URI parameters. Headers and the full RFC 3261 user syntax are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipUri {
    pub sips: bool,
    pub user: Option<BytesStr>,
    pub host: BytesStr,
    pub port: Option<u16>,
    pub params: Params,
}

impl SipUri {
    pub fn new<H>(user: Option<BytesStr>, host: H, port: Option<u16>) -> Self
    where
        H: Into<BytesStr>,
    {
        Self {
            sips: false,
            user,
            host: host.into(),
            port,
            params: Params::new(),
        }
    }

    /// Parse a URI including its `;`-parameters
    pub fn parse<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| {
            map(
                tuple((Self::parse_no_params(src), Params::parse(src))),
                |(mut uri, params)| {
                    uri.params = params;
                    uri
                },
            )(i)
        }
    }

    /// Parse a URI, leaving any trailing `;`-parameters untouched.
    ///
    /// Needed for From/To/Contact headers in their addr-spec form, where
    /// trailing parameters belong to the header, not the URI.
    pub fn parse_no_params<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| {
            map(
                tuple((
                    alt((
                        map(tag_no_case("sips:"), |_| true),
                        map(tag_no_case("sip:"), |_| false),
                    )),
                    opt(terminated(take_while1(token), char('@'))),
                    take_while1(host_char),
                    opt(preceded(char(':'), map_res(digit1, FromStr::from_str))),
                )),
                |(sips, user, host, port)| SipUri {
                    sips,
                    user: user.map(|user| BytesStr::from_parse(src, user)),
                    host: BytesStr::from_parse(src, host),
                    port,
                    params: Params::new(),
                },
            )(i)
        }
    }

    /// The value of the `transport` URI parameter
    pub fn transport(&self) -> Option<&BytesStr> {
        self.params.get_value("transport")
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.sips { "sips:" } else { "sip:" })?;

        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }

        f.write_str(&self.host)?;

        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }

        self.params.fmt(f)
    }
}

impl FromStr for SipUri {
    type Err = InvalidSipUri;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = BytesStr::from(s);

        match SipUri::parse(s.as_ref())(&s) {
            Ok(("", uri)) => Ok(uri),
            _ => Err(InvalidSipUri),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid sip uri")]
pub struct InvalidSipUri;

/// `name-addr`: an optional display name plus a URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAddr {
    pub display_name: Option<BytesStr>,
    pub uri: SipUri,
}

impl NameAddr {
    pub fn uri(uri: SipUri) -> Self {
        Self {
            display_name: None,
            uri,
        }
    }

    pub fn new<N>(display_name: N, uri: SipUri) -> Self
    where
        N: Into<BytesStr>,
    {
        Self {
            display_name: Some(display_name.into()),
            uri,
        }
    }

    /// Parse either `"Display" <uri>`, `<uri>` or a bare addr-spec.
    ///
    /// The bare form does not consume `;`-parameters, matching how From/To
    /// headers are specified.
    pub fn parse<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| {
            alt((
                map(
                    tuple((
                        opt(alt((
                            terminated(parse_quoted, take_while(whitespace)),
                            take_while1(|c| token(c) || whitespace(c)),
                        ))),
                        delimited(char('<'), |i| SipUri::parse(src)(i), char('>')),
                    )),
                    |(display_name, uri)| NameAddr {
                        display_name: display_name
                            .map(str::trim)
                            .filter(|name| !name.is_empty())
                            .map(|name| BytesStr::from_parse(src, name)),
                        uri,
                    },
                ),
                map(SipUri::parse_no_params(src), NameAddr::uri),
            ))(i)
        }
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(display_name) = &self.display_name {
            write!(f, "\"{display_name}\" ")?;
        }

        write!(f, "<{}>", self.uri)
    }
}
