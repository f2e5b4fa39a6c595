use bytes::Bytes;
use bytesstr::BytesStr;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A case-insensitive header name.
///
/// Well known names are available as constants and carry their canonical
/// print form. Compact forms are folded into the canonical name at parse
/// time; compact names are never printed.
#[derive(Debug, Clone)]
pub struct Name(Repr);

#[derive(Debug, Clone)]
enum Repr {
    Static(&'static str),
    Dynamic(BytesStr),
}

macro_rules! names {
    ($($print:literal $(/ $compact:literal)?, $ident:ident;)+) => {
        impl Name {
            $(pub const $ident: Name = Name(Repr::Static($print));)+

            /// Map well known (including compact) names to their canonical
            /// representation
            pub fn from_parse(src: &Bytes, slice: &str) -> Self {
                $(
                    if slice.eq_ignore_ascii_case($print) {
                        return Name::$ident;
                    }

                    $(
                        if slice.eq_ignore_ascii_case($compact) {
                            return Name::$ident;
                        }
                    )?
                )+

                Name(Repr::Dynamic(BytesStr::from_parse(src, slice)))
            }
        }
    };
}

names! {
    "Via" / "v",                VIA;
    "From" / "f",               FROM;
    "To" / "t",                 TO;
    "Call-ID" / "i",            CALL_ID;
    "CSeq",                     CSEQ;
    "Contact" / "m",            CONTACT;
    "Max-Forwards",             MAX_FORWARDS;
    "Route",                    ROUTE;
    "Content-Type" / "c",       CONTENT_TYPE;
    "Content-Length" / "l",     CONTENT_LENGTH;
    "WWW-Authenticate",         WWW_AUTHENTICATE;
    "Proxy-Authenticate",       PROXY_AUTHENTICATE;
    "Authorization",            AUTHORIZATION;
    "Proxy-Authorization",      PROXY_AUTHORIZATION;
    "Allow",                    ALLOW;
    "Supported" / "k",          SUPPORTED;
    "Reason",                   REASON;
}

impl Name {
    pub fn as_str(&self) -> &str {
        match &self.0 {
            Repr::Static(s) => s,
            Repr::Dynamic(s) => s,
        }
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.as_str().bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn case_insensitive_eq() {
        let src = Bytes::from_static(b"CALL-ID");
        let parsed = Name::from_parse(&src, "CALL-ID");

        assert_eq!(parsed, Name::CALL_ID);
        assert_eq!(parsed.as_str(), "Call-ID");
    }

    #[test]
    fn compact_forms_fold_to_canonical() {
        let src = Bytes::from_static(b"v");

        assert_eq!(Name::from_parse(&src, "v"), Name::VIA);
        assert_eq!(Name::from_parse(&src, "f"), Name::FROM);
        assert_eq!(Name::from_parse(&src, "l"), Name::CONTENT_LENGTH);
    }

    #[test]
    fn unknown_names_survive() {
        let src = Bytes::from_static(b"X-Custom");
        let name = Name::from_parse(&src, "X-Custom");

        assert_eq!(name.as_str(), "X-Custom");
        assert_ne!(name, Name::VIA);
    }
}
