use crate::parse::token;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, opt};
use nom::multi::many0;
use nom::sequence::{preceded, tuple};
use std::fmt;

fn param_char(c: char) -> bool {
    token(c) || matches!(c, ':' | '[' | ']')
}

/// A single `;name` or `;name=value` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: BytesStr,
    pub value: Option<BytesStr>,
}

impl Param {
    pub fn new<N>(name: N, value: Option<BytesStr>) -> Self
    where
        N: Into<BytesStr>,
    {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ";{}", self.name)?;

        if let Some(value) = &self.value {
            write!(f, "={value}")?;
        }

        Ok(())
    }
}

/// Ordered list of `;`-separated parameters as found in URIs, Via and
/// From/To headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn parse<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| {
            map(
                many0(preceded(
                    // folded header lines leave whitespace around the separator
                    tuple((multispace0, char(';'), multispace0)),
                    tuple((
                        take_while1(param_char),
                        opt(preceded(char('='), take_while1(param_char))),
                    )),
                )),
                |params| {
                    Params(
                        params
                            .into_iter()
                            .map(|(name, value)| Param {
                                name: BytesStr::from_parse(src, name),
                                value: value.map(|value| BytesStr::from_parse(src, value)),
                            })
                            .collect(),
                    )
                },
            )(i)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0
            .iter()
            .find(|param| param.name.eq_ignore_ascii_case(name))
    }

    pub fn get_value(&self, name: &str) -> Option<&BytesStr> {
        self.get(name).and_then(|param| param.value.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn push<N>(&mut self, name: N, value: Option<BytesStr>)
    where
        N: Into<BytesStr>,
    {
        self.0.push(Param::new(name, value));
    }

    /// Remove the parameter `name`, returning its value if it had one
    pub fn take(&mut self, name: &str) -> Option<Option<BytesStr>> {
        let idx = self
            .0
            .iter()
            .position(|param| param.name.eq_ignore_ascii_case(name))?;

        Some(self.0.remove(idx).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in &self.0 {
            param.fmt(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_flags_and_values() {
        let input = BytesStr::from_static(";rport;branch=z9hG4bKnashds7;alias");

        let (rem, params) = Params::parse(input.as_ref())(&input).unwrap();

        assert!(rem.is_empty());
        assert!(params.contains("rport"));
        assert!(params.contains("alias"));
        assert_eq!(params.get_value("branch").unwrap(), "z9hG4bKnashds7");
        assert_eq!(params.get_value("rport"), None);
    }

    #[test]
    fn case_insensitive_names() {
        let input = BytesStr::from_static(";Branch=z9hG4bKabc");

        let (_, params) = Params::parse(input.as_ref())(&input).unwrap();

        assert_eq!(params.get_value("branch").unwrap(), "z9hG4bKabc");
    }

    #[test]
    fn print() {
        let mut params = Params::new();
        params.push("rport", None);
        params.push("branch", Some("z9hG4bKabc".into()));

        assert_eq!(params.to_string(), ";rport;branch=z9hG4bKabc");
    }
}
