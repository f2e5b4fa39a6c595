use crate::header::{ConstNamed, HeaderError, HeaderParse};
use crate::Name;
use bytesstr::BytesStr;
use std::fmt;

/// Ordered multimap of header name to raw value.
///
/// Insertion order is preserved and is the order headers are printed in.
/// Lookups are case-insensitive.
#[derive(Debug, Default, Clone)]
pub struct Headers {
    entries: Vec<(Name, BytesStr)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a header, keeping any existing values with the same name
    pub fn insert<V>(&mut self, name: Name, value: V)
    where
        V: Into<BytesStr>,
    {
        self.entries.push((name, value.into()));
    }

    /// Append a typed header under its constant name
    pub fn insert_named<H>(&mut self, header: &H)
    where
        H: ConstNamed + fmt::Display,
    {
        self.insert(H::NAME, header.to_string());
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// The first (topmost) value of `name`
    pub fn get(&self, name: &Name) -> Option<&BytesStr> {
        self.entries
            .iter()
            .find_map(|(n, value)| (n == name).then_some(value))
    }

    pub fn get_all<'s>(&'s self, name: &'s Name) -> impl Iterator<Item = &'s BytesStr> + 's {
        self.entries
            .iter()
            .filter_map(move |(n, value)| (n == name).then_some(value))
    }

    /// Parse the first value of `name` into a typed header
    pub fn get_parsed<H>(&self, name: &Name) -> Result<H, HeaderError>
    where
        H: HeaderParse,
    {
        let value = self
            .get(name)
            .ok_or_else(|| HeaderError::Missing(name.clone()))?;

        match H::parse(value.as_ref(), value) {
            Ok((_, header)) => Ok(header),
            Err(_) => Err(HeaderError::Malformed(name.clone())),
        }
    }

    /// Like [`Headers::get_parsed`] but returns `None` when the header is absent
    pub fn try_get_parsed<H>(&self, name: &Name) -> Result<Option<H>, HeaderError>
    where
        H: HeaderParse,
    {
        if self.contains(name) {
            self.get_parsed(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Parse the first value of a [`ConstNamed`] typed header
    pub fn get_named<H>(&self) -> Result<H, HeaderError>
    where
        H: HeaderParse + ConstNamed,
    {
        self.get_parsed(&H::NAME)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &BytesStr)> {
        self.entries.iter().map(|(name, value)| (name, value))
    }

    /// Append a folded continuation line to the most recently inserted
    /// header value. Returns false when there is no header to fold into.
    pub(crate) fn fold_into_last(&mut self, continuation: &str) -> bool {
        let Some((_, value)) = self.entries.last_mut() else {
            return false;
        };

        *value = format!("{value} {continuation}").into();
        true
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insertion_order_is_preserved() {
        let mut headers = Headers::new();
        headers.insert(Name::VIA, "SIP/2.0/UDP a.example.com;branch=z9hG4bK1");
        headers.insert(Name::MAX_FORWARDS, "70");
        headers.insert(Name::VIA, "SIP/2.0/UDP b.example.com;branch=z9hG4bK2");

        let vias: Vec<_> = headers.get_all(&Name::VIA).collect();
        assert_eq!(vias.len(), 2);
        assert!(vias[0].starts_with("SIP/2.0/UDP a."));

        let printed = headers.to_string();
        let first_via = printed.find("a.example.com").unwrap();
        let max_forwards = printed.find("Max-Forwards").unwrap();
        let second_via = printed.find("b.example.com").unwrap();

        assert!(first_via < max_forwards);
        assert!(max_forwards < second_via);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert(Name::CALL_ID, "abc@host");

        let src = bytes::Bytes::from_static(b"call-id");
        let name = Name::from_parse(&src, "call-id");

        assert_eq!(headers.get(&name).unwrap(), "abc@host");
    }
}
