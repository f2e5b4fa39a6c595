mod packetizer;
mod rtp_packet;
mod telephone_event;

pub use packetizer::Packetizer;
pub use rtp_packet::{RTP_HEADER_LEN, RTP_VERSION, RtpPacket, RtpParseError};
pub use telephone_event::{TelephoneEvent, TelephoneEventError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ssrc(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u16);

impl SequenceNumber {
    pub fn increase_one(&mut self) -> SequenceNumber {
        let current = *self;
        self.0 = self.0.wrapping_add(1);
        current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RtpTimestamp(pub u32);

impl RtpTimestamp {
    pub fn advance(&mut self, samples: u32) -> RtpTimestamp {
        let current = *self;
        self.0 = self.0.wrapping_add(samples);
        current
    }
}

#[cfg(test)]
mod test {
    use super::{RtpTimestamp, SequenceNumber};

    #[test]
    fn sequence_number_wraps() {
        let mut seq = SequenceNumber(u16::MAX);
        assert_eq!(seq.increase_one(), SequenceNumber(u16::MAX));
        assert_eq!(seq, SequenceNumber(0));
    }

    #[test]
    fn timestamp_wraps() {
        let mut ts = RtpTimestamp(u32::MAX - 59);
        assert_eq!(ts.advance(160), RtpTimestamp(u32::MAX - 59));
        assert_eq!(ts, RtpTimestamp(100));
    }
}
