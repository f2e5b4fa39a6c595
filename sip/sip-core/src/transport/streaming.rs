use bytes::{Buf, Bytes, BytesMut};
use sip_types::msg::PullParser;
use std::io;
use std::str::from_utf8;
use tokio_util::codec::Decoder;

const MAX_MSG_SIZE: usize = u16::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("receiving message too large")]
    MessageTooLarge,
    #[error("received message is malformed")]
    Malformed,
}

/// Frames complete SIP messages off a reliable byte stream by scanning the
/// head for its end and the Content-Length header.
#[derive(Default)]
pub(crate) struct StreamingDecoder {
    head_progress: usize,

    /// Content-Length seen so far, kept across calls since resuming at
    /// `head_progress` skips already scanned lines
    content_len: usize,
}

impl Decoder for StreamingDecoder {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // strip leading newlines, they separate messages or act as keep-alives
        let whitespace_count = src.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if whitespace_count > 0 {
            src.advance(whitespace_count);
            self.head_progress = 0;
            self.content_len = 0;
        }

        if src.is_empty() {
            return Ok(None);
        }

        if src.len() > MAX_MSG_SIZE {
            src.clear();

            return Err(Error::MessageTooLarge);
        }

        let mut parser = PullParser::new(src, self.head_progress);

        for line in &mut parser {
            let Ok(line) = line else {
                // cannot parse the complete message head yet
                self.head_progress = parser.progress();
                return Ok(None);
            };

            // scan for the content-length header so the complete
            // message size can be calculated
            let mut split = line.splitn(2, |&c| c == b':');

            let Some(name) = split.next() else {
                continue;
            };

            let name_matches = name.eq_ignore_ascii_case(b"Content-Length")
                || name.eq_ignore_ascii_case(b"l");

            if name_matches {
                let value = split.next().ok_or(Error::Malformed)?;
                let value = from_utf8(value).map_err(|_| Error::Malformed)?;

                self.content_len = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| Error::Malformed)?;

                if self.content_len > MAX_MSG_SIZE {
                    return Err(Error::MessageTooLarge);
                }
            }
        }

        // parser completed without errors, message head is complete

        let expected_complete_message_size = parser.head_end() + self.content_len;

        if src.len() < expected_complete_message_size {
            src.reserve(expected_complete_message_size - src.len());
            return Ok(None);
        }

        self.head_progress = 0;
        self.content_len = 0;

        Ok(Some(src.split_to(expected_complete_message_size).freeze()))
    }
}
