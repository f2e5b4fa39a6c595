use crate::connection::Connection;
use crate::media_description::MediaDescription;
use crate::origin::Origin;
use crate::parser::{ParseSessionDescriptionError, parse_session_description};
use bytesstr::BytesStr;
use std::fmt;

/// A complete session description
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5)
#[derive(Debug, Clone)]
pub struct SessionDescription {
    /// Origin (o field)
    pub origin: Origin,

    /// Session name (s field)
    pub name: BytesStr,

    /// Session level connection (c field)
    pub connection: Option<Connection>,

    /// Media descriptions, one per m= section
    pub media_descriptions: Vec<MediaDescription>,
}

impl SessionDescription {
    pub fn parse(src: &BytesStr) -> Result<Self, ParseSessionDescriptionError> {
        parse_session_description(src)
    }

    /// The first audio media description, if any
    pub fn audio(&self) -> Option<&MediaDescription> {
        self.media_descriptions
            .iter()
            .find(|desc| desc.media.media_type == crate::MediaType::Audio)
    }

    /// The connection address that applies to `media`, honoring the media
    /// level override
    pub fn connection_for<'a>(&'a self, media: &'a MediaDescription) -> Option<&'a Connection> {
        media.connection.as_ref().or(self.connection.as_ref())
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v=0\r\n")?;
        write!(f, "o={}\r\n", self.origin)?;
        write!(f, "s={}\r\n", self.name)?;

        if let Some(conn) = &self.connection {
            write!(f, "c={conn}\r\n")?;
        }

        write!(f, "t=0 0\r\n")?;

        for media_description in &self.media_descriptions {
            media_description.fmt(f)?;
        }

        Ok(())
    }
}
