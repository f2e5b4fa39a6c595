use crate::{RtpPacket, RtpTimestamp, SequenceNumber, Ssrc};
use bytes::Bytes;
use rand::Rng;

/// Builds outgoing RTP packets for a single stream.
///
/// Sequence number, timestamp and SSRC start at random values. The timestamp
/// advances by the payload's sample count, which for G.711 equals its length
/// in bytes.
#[derive(Debug)]
pub struct Packetizer {
    pt: u8,
    sequence_number: SequenceNumber,
    timestamp: RtpTimestamp,
    ssrc: Ssrc,
}

impl Packetizer {
    pub fn new(pt: u8) -> Self {
        let mut rng = rand::rng();

        Self {
            pt,
            sequence_number: SequenceNumber(rng.random()),
            timestamp: RtpTimestamp(rng.random()),
            ssrc: Ssrc(rng.random()),
        }
    }

    pub fn with_parts(pt: u8, sequence_number: SequenceNumber, timestamp: RtpTimestamp, ssrc: Ssrc) -> Self {
        Self {
            pt,
            sequence_number,
            timestamp,
            ssrc,
        }
    }

    pub fn ssrc(&self) -> Ssrc {
        self.ssrc
    }

    pub fn next_packet(&mut self, payload: Bytes) -> RtpPacket {
        let samples = payload.len() as u32;

        RtpPacket {
            pt: self.pt,
            marker: false,
            sequence_number: self.sequence_number.increase_one(),
            timestamp: self.timestamp.advance(samples),
            ssrc: self.ssrc,
            payload,
        }
    }
}
