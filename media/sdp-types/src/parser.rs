use crate::attributes::{Direction, Fmtp, RtpMap, Ssrc, UnknownAttribute};
use crate::connection::Connection;
use crate::media::Media;
use crate::media_description::MediaDescription;
use crate::origin::Origin;
use crate::session_description::SessionDescription;
use bytes::Bytes;
use bytesstr::BytesStr;

#[derive(Debug, thiserror::Error)]
pub enum ParseSessionDescriptionError {
    #[error("session description must start with a v=0 line")]
    InvalidVersion,
    #[error("session description is missing its {0} line")]
    MissingLine(char),
    #[error("malformed {0} line")]
    MalformedLine(char),
}

pub(crate) fn parse_session_description(
    src: &BytesStr,
) -> Result<SessionDescription, ParseSessionDescriptionError> {
    use ParseSessionDescriptionError::*;

    let bytes: &Bytes = src.as_ref();

    let mut lines = src
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty());

    if lines.next() != Some("v=0") {
        return Err(InvalidVersion);
    }

    let mut origin = None;
    let mut name = None;
    let mut connection = None;
    let mut media_descriptions: Vec<MediaDescription> = Vec::new();

    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            // lines without a key are ignored, like any unknown line type
            continue;
        };

        let &[key] = key.as_bytes() else {
            continue;
        };

        match key {
            b'o' => {
                let (_, parsed) = Origin::parse(bytes, value).map_err(|_| MalformedLine('o'))?;
                origin = Some(parsed);
            }
            b's' => {
                name = Some(BytesStr::from_parse(bytes, value));
            }
            b'c' => {
                let (_, parsed) =
                    Connection::parse(bytes, value).map_err(|_| MalformedLine('c'))?;

                match media_descriptions.last_mut() {
                    Some(media) => media.connection = Some(parsed),
                    None => connection = Some(parsed),
                }
            }
            b'm' => {
                let (_, parsed) = Media::parse(bytes, value).map_err(|_| MalformedLine('m'))?;
                media_descriptions.push(MediaDescription::new(parsed));
            }
            b'a' => {
                // attributes before the first media description are session
                // level and of no interest here
                let Some(media) = media_descriptions.last_mut() else {
                    continue;
                };

                parse_media_attribute(bytes, value, media);
            }
            _ => {
                // v= has been consumed, t=/b=/k=/... carry nothing we need
            }
        }
    }

    Ok(SessionDescription {
        origin: origin.ok_or(MissingLine('o'))?,
        name: name.ok_or(MissingLine('s'))?,
        connection,
        media_descriptions,
    })
}

fn parse_media_attribute(src: &Bytes, value: &str, media: &mut MediaDescription) {
    let (name, attr_value) = match value.split_once(':') {
        Some((name, value)) => (name, Some(value)),
        None => (value, None),
    };

    if let Some(direction) = Direction::from_name(name) {
        media.direction = direction;
        return;
    }

    match (name, attr_value) {
        ("rtpmap", Some(attr_value)) => {
            if let Ok((_, rtpmap)) = RtpMap::parse(src, attr_value) {
                media.rtpmap.push(rtpmap);
            }
        }
        ("fmtp", Some(attr_value)) => {
            if let Ok((_, fmtp)) = Fmtp::parse(src, attr_value) {
                media.fmtp.push(fmtp);
            }
        }
        ("ssrc", Some(attr_value)) => {
            if let Ok((_, ssrc)) = Ssrc::parse(src, attr_value) {
                media.ssrc = Some(ssrc);
            }
        }
        _ => media.attributes.push(UnknownAttribute::parse(src, value)),
    }
}
