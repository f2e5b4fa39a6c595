use crate::connection::Connection;
use crate::media::Media;
use crate::{Direction, Fmtp, RtpMap, Ssrc, UnknownAttribute};
use std::fmt;

/// Part of the [`SessionDescription`](crate::SessionDescription), describes a
/// single media session
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.14)
#[derive(Debug, Clone)]
pub struct MediaDescription {
    /// Media description's media field (m=)
    pub media: Media,

    /// Optional connection (c field), overrides the session level connection
    pub connection: Option<Connection>,

    /// Media direction attribute
    pub direction: Direction,

    /// RTP payload mappings
    pub rtpmap: Vec<RtpMap>,

    /// RTP encoding parameters
    pub fmtp: Vec<Fmtp>,

    /// SSRC attribute (a=ssrc)
    pub ssrc: Option<Ssrc>,

    /// Additional attributes
    pub attributes: Vec<UnknownAttribute>,
}

impl MediaDescription {
    pub fn new(media: Media) -> Self {
        Self {
            media,
            connection: None,
            direction: Direction::SendRecv,
            rtpmap: Vec::new(),
            fmtp: Vec::new(),
            ssrc: None,
            attributes: Vec::new(),
        }
    }

    /// The rtpmap entry for `payload`, if the peer offered one
    pub fn rtpmap_for(&self, payload: u8) -> Option<&RtpMap> {
        self.rtpmap.iter().find(|rtpmap| rtpmap.payload == payload)
    }
}

impl fmt::Display for MediaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m={}\r\n", self.media)?;

        if let Some(conn) = &self.connection {
            write!(f, "c={conn}\r\n")?;
        }

        for rtpmap in &self.rtpmap {
            write!(f, "a=rtpmap:{rtpmap}\r\n")?;
        }

        for fmtp in &self.fmtp {
            write!(f, "a=fmtp:{fmtp}\r\n")?;
        }

        write!(f, "a={}\r\n", self.direction)?;

        if let Some(ssrc) = &self.ssrc {
            write!(f, "a=ssrc:{ssrc}\r\n")?;
        }

        for attr in &self.attributes {
            write!(f, "{attr}\r\n")?;
        }

        Ok(())
    }
}
