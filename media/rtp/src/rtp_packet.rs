use crate::{RtpTimestamp, SequenceNumber, Ssrc};
use bytes::Bytes;

/// Fixed RTP version (RFC 3550 Section 5.1)
pub const RTP_VERSION: u8 = 2;

/// Length of the fixed RTP header, without CSRCs or extensions
pub const RTP_HEADER_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum RtpParseError {
    #[error("packet of {0} bytes is too short to contain an RTP header")]
    Truncated(usize),
    #[error("unsupported RTP version {0}")]
    UnsupportedVersion(u8),
}

#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub pt: u8,
    pub marker: bool,
    pub sequence_number: SequenceNumber,
    pub timestamp: RtpTimestamp,
    pub ssrc: Ssrc,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Parse a datagram into an RTP packet.
    ///
    /// Rejects anything that is not version 2 or shorter than the fixed
    /// header. CSRC entries and header extensions are skipped, padding is
    /// stripped off the payload.
    pub fn parse(bytes: impl Into<Bytes>) -> Result<Self, RtpParseError> {
        let bytes: Bytes = bytes.into();

        if bytes.len() < RTP_HEADER_LEN {
            return Err(RtpParseError::Truncated(bytes.len()));
        }

        let version = bytes[0] >> 6;
        if version != RTP_VERSION {
            return Err(RtpParseError::UnsupportedVersion(version));
        }

        let padding = bytes[0] & 0x20 != 0;
        let extension = bytes[0] & 0x10 != 0;
        let csrc_count = usize::from(bytes[0] & 0x0F);

        let marker = bytes[1] & 0x80 != 0;
        let pt = bytes[1] & 0x7F;

        let sequence_number = u16::from_be_bytes([bytes[2], bytes[3]]);
        let timestamp = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let ssrc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        let mut payload_start = RTP_HEADER_LEN + csrc_count * 4;

        if extension {
            // profile id (2) + length (2), length counted in 32 bit words
            if bytes.len() < payload_start + 4 {
                return Err(RtpParseError::Truncated(bytes.len()));
            }

            let words =
                usize::from(u16::from_be_bytes([bytes[payload_start + 2], bytes[payload_start + 3]]));

            payload_start += 4 + words * 4;
        }

        let mut payload_end = bytes.len();

        if padding {
            let padding_len = usize::from(bytes[payload_end - 1]);
            payload_end = payload_end.saturating_sub(padding_len);
        }

        if payload_start > payload_end {
            return Err(RtpParseError::Truncated(bytes.len()));
        }

        Ok(Self {
            pt,
            marker,
            sequence_number: SequenceNumber(sequence_number),
            timestamp: RtpTimestamp(timestamp),
            ssrc: Ssrc(ssrc),
            payload: bytes.slice(payload_start..payload_end),
        })
    }

    /// Serialize the packet, fixed header only (no padding, extensions or CSRCs)
    pub fn write_vec(&self, vec: &mut Vec<u8>) {
        vec.reserve(RTP_HEADER_LEN + self.payload.len());

        vec.push(RTP_VERSION << 6);
        vec.push(u8::from(self.marker) << 7 | (self.pt & 0x7F));
        vec.extend_from_slice(&self.sequence_number.0.to_be_bytes());
        vec.extend_from_slice(&self.timestamp.0.to_be_bytes());
        vec.extend_from_slice(&self.ssrc.0.to_be_bytes());
        vec.extend_from_slice(&self.payload);
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(RTP_HEADER_LEN + self.payload.len());
        self.write_vec(&mut vec);
        vec
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn packet() -> RtpPacket {
        RtpPacket {
            pt: 0,
            marker: false,
            sequence_number: SequenceNumber(4919),
            timestamp: RtpTimestamp(0xDEAD_BEEF),
            ssrc: Ssrc(0x1234_5678),
            payload: Bytes::from_static(&[0xFF; 160]),
        }
    }

    #[test]
    fn serialize_fixed_header() {
        let bytes = packet().to_vec();

        assert_eq!(bytes.len(), 172);
        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(&bytes[2..4], &4919u16.to_be_bytes());
        assert_eq!(&bytes[4..8], &0xDEAD_BEEFu32.to_be_bytes());
        assert_eq!(&bytes[8..12], &0x1234_5678u32.to_be_bytes());
    }

    #[test]
    fn parse_own_output() {
        let parsed = RtpPacket::parse(packet().to_vec()).unwrap();

        assert_eq!(parsed.pt, 0);
        assert!(!parsed.marker);
        assert_eq!(parsed.sequence_number, SequenceNumber(4919));
        assert_eq!(parsed.timestamp, RtpTimestamp(0xDEAD_BEEF));
        assert_eq!(parsed.ssrc, Ssrc(0x1234_5678));
        assert_eq!(parsed.payload.len(), 160);
    }

    #[test]
    fn parse_marker_and_pt() {
        let mut bytes = packet().to_vec();
        bytes[1] = 0x80 | 101;

        let parsed = RtpPacket::parse(bytes).unwrap();
        assert!(parsed.marker);
        assert_eq!(parsed.pt, 101);
    }

    #[test]
    fn reject_wrong_version() {
        let mut bytes = packet().to_vec();
        bytes[0] = 0x40;

        assert!(matches!(
            RtpPacket::parse(bytes),
            Err(RtpParseError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn reject_truncated() {
        assert!(matches!(
            RtpPacket::parse(vec![0x80u8, 0, 0, 1]),
            Err(RtpParseError::Truncated(4))
        ));
    }

    #[test]
    fn strips_padding() {
        let mut bytes = packet().to_vec();
        bytes[0] |= 0x20;
        bytes.extend_from_slice(&[0, 0, 0, 4]);

        let parsed = RtpPacket::parse(bytes).unwrap();
        assert_eq!(parsed.payload.len(), 160);
    }
}
