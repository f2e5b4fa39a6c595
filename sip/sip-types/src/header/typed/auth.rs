use crate::parse::{parse_quoted, token};
use crate::header::HeaderParse;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::{char, multispace0, space1};
use nom::combinator::map;
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, separated_pair};
use std::fmt;

fn auth_param<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, (&'i str, BytesStr)> {
    separated_pair(
        take_while1(token),
        char('='),
        alt((
            map(parse_quoted, |value| BytesStr::from_parse(src, value)),
            map(take_while1(token), |value| BytesStr::from_parse(src, value)),
        )),
    )(i)
}

/// A digest challenge taken from a `WWW-Authenticate` or
/// `Proxy-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: BytesStr,
    pub nonce: BytesStr,
    pub algorithm: Option<BytesStr>,
    pub opaque: Option<BytesStr>,

    /// Raw qop-options list, e.g. `auth,auth-int`
    pub qop: Option<BytesStr>,
}

impl DigestChallenge {
    /// Does the challenge allow the `auth` quality of protection?
    pub fn supports_qop_auth(&self) -> bool {
        self.qop
            .as_deref()
            .is_some_and(|qop| qop.split(',').any(|qop| qop.trim().eq_ignore_ascii_case("auth")))
    }
}

impl HeaderParse for DigestChallenge {
    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        let (i, params) = preceded(
            preceded(multispace0, tag_no_case("Digest")),
            preceded(
                space1,
                separated_list1(delimited(multispace0, char(','), multispace0), |i| {
                    auth_param(src, i)
                }),
            ),
        )(i)?;

        let mut realm = None;
        let mut nonce = None;
        let mut algorithm = None;
        let mut opaque = None;
        let mut qop = None;

        for (name, value) in params {
            if name.eq_ignore_ascii_case("realm") {
                realm = Some(value);
            } else if name.eq_ignore_ascii_case("nonce") {
                nonce = Some(value);
            } else if name.eq_ignore_ascii_case("algorithm") {
                algorithm = Some(value);
            } else if name.eq_ignore_ascii_case("opaque") {
                opaque = Some(value);
            } else if name.eq_ignore_ascii_case("qop") {
                qop = Some(value);
            }
        }

        let (Some(realm), Some(nonce)) = (realm, nonce) else {
            return Err(nom::Err::Error(nom::error::VerboseError {
                errors: vec![(
                    i,
                    nom::error::VerboseErrorKind::Context("digest challenge without realm/nonce"),
                )],
            }));
        };

        Ok((
            i,
            Self {
                realm,
                nonce,
                algorithm,
                opaque,
                qop,
            },
        ))
    }
}

/// The credentials echoed back in an `Authorization` /
/// `Proxy-Authorization` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestAuthorization {
    pub username: BytesStr,
    pub realm: BytesStr,
    pub nonce: BytesStr,

    /// Request-URI in its string form
    pub uri: BytesStr,
    pub response: BytesStr,
    pub algorithm: BytesStr,
    pub opaque: Option<BytesStr>,

    /// Set when the challenge advertised `qop=auth`
    pub qop_response: Option<QopResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QopResponse {
    pub cnonce: BytesStr,
    pub nc: u32,
}

impl fmt::Display for DigestAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm={}",
            self.username, self.realm, self.nonce, self.uri, self.response, self.algorithm
        )?;

        if let Some(qop_response) = &self.qop_response {
            write!(
                f,
                ", qop=auth, cnonce=\"{}\", nc={:08x}",
                qop_response.cnonce, qop_response.nc
            )?;
        }

        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{opaque}\"")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn challenge() {
        let value = "Digest realm=\"asterisk\", nonce=\"abc\", algorithm=MD5";
        let src = Bytes::copy_from_slice(value.as_bytes());
        let value = std::str::from_utf8(&src).unwrap();

        let (_, challenge) = DigestChallenge::parse(&src, value).unwrap();

        assert_eq!(challenge.realm, "asterisk");
        assert_eq!(challenge.nonce, "abc");
        assert_eq!(challenge.algorithm.clone().unwrap(), "MD5");
        assert_eq!(challenge.opaque, None);
        assert!(!challenge.supports_qop_auth());
    }

    #[test]
    fn challenge_with_qop() {
        let value = "Digest realm=\"example.com\", qop=\"auth,auth-int\", nonce=\"xyz\"";
        let src = Bytes::copy_from_slice(value.as_bytes());
        let value = std::str::from_utf8(&src).unwrap();

        let (_, challenge) = DigestChallenge::parse(&src, value).unwrap();

        assert!(challenge.supports_qop_auth());
    }

    #[test]
    fn challenge_without_nonce_is_rejected() {
        let value = "Digest realm=\"example.com\"";
        let src = Bytes::copy_from_slice(value.as_bytes());
        let value = std::str::from_utf8(&src).unwrap();

        assert!(DigestChallenge::parse(&src, value).is_err());
    }

    #[test]
    fn authorization_print() {
        let authorization = DigestAuthorization {
            username: "alice".into(),
            realm: "asterisk".into(),
            nonce: "abc".into(),
            uri: "sip:bob@example.com".into(),
            response: "f2f7eb2baeb958a011057d75f1b25db9".into(),
            algorithm: "MD5".into(),
            opaque: None,
            qop_response: None,
        };

        assert_eq!(
            authorization.to_string(),
            "Digest username=\"alice\", realm=\"asterisk\", nonce=\"abc\", \
             uri=\"sip:bob@example.com\", response=\"f2f7eb2baeb958a011057d75f1b25db9\", \
             algorithm=MD5"
        );
    }

    #[test]
    fn authorization_print_with_qop() {
        let authorization = DigestAuthorization {
            username: "alice".into(),
            realm: "asterisk".into(),
            nonce: "abc".into(),
            uri: "sip:bob@example.com".into(),
            response: "d9c392d57d971cb739d643fb149e27f6".into(),
            algorithm: "MD5".into(),
            opaque: None,
            qop_response: Some(QopResponse {
                cnonce: "0a4f113b775e9074".into(),
                nc: 1,
            }),
        };

        let printed = authorization.to_string();

        assert!(printed.contains("qop=auth"));
        assert!(printed.contains("cnonce=\"0a4f113b775e9074\""));
        assert!(printed.contains("nc=00000001"));
    }
}
