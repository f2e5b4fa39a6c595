//! RFC 2833 telephone-event payload

const DTMF_KEYS: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '*', '#', 'A', 'B', 'C', 'D',
];

#[derive(Debug, thiserror::Error)]
#[error("telephone-event payload of {0} bytes is too short")]
pub struct TelephoneEventError(usize);

/// A single RFC 2833 event packet payload.
///
/// Key presses are reported over multiple packets, ending with a run of
/// packets that have the end bit set. Receivers must deduplicate those by RTP
/// timestamp to observe one event per press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelephoneEvent {
    pub event: u8,
    pub end: bool,
    pub volume: u8,
    pub duration: u16,
}

impl TelephoneEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, TelephoneEventError> {
        if payload.len() < 4 {
            return Err(TelephoneEventError(payload.len()));
        }

        Ok(Self {
            event: payload[0],
            end: payload[1] & 0x80 != 0,
            volume: payload[1] & 0x3F,
            duration: u16::from_be_bytes([payload[2], payload[3]]),
        })
    }

    /// The DTMF key this event maps to, `None` for events outside 0..=15
    pub fn key(&self) -> Option<char> {
        DTMF_KEYS.get(usize::from(self.event)).copied()
    }
}
