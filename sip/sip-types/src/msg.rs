//! Message model: start lines, full messages and their wire form

use crate::header::typed::{CSeq, CallId, ContentLength, DigestChallenge, FromTo, Via};
use crate::uri::SipUri;
use crate::{HeaderError, Headers, Method, Name, StatusCode};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{digit1, space1};
use nom::combinator::{map, map_res, rest};
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::{FromStr, from_utf8};

/// Start line of a request
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub uri: SipUri,
}

impl RequestLine {
    pub fn parse<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| {
            map(
                tuple((
                    Method::parse(src),
                    preceded(space1, SipUri::parse(src)),
                    preceded(space1, tag("SIP/2.0")),
                )),
                |(method, uri, _)| RequestLine { method, uri },
            )(i)
        }
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} SIP/2.0", self.method, self.uri)
    }
}

/// Start line of a response
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub code: StatusCode,
    pub reason: BytesStr,
}

impl StatusLine {
    pub fn parse<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| {
            map(
                tuple((
                    tag("SIP/2.0"),
                    preceded(space1, map_res(digit1, u16::from_str)),
                    preceded(space1, rest),
                )),
                |(_, code, reason)| StatusLine {
                    code: StatusCode::from(code),
                    reason: BytesStr::from_parse(src, reason.trim()),
                },
            )(i)
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0 {} {}", self.code, self.reason)
    }
}

#[derive(Debug, Clone)]
pub enum MessageLine {
    Request(RequestLine),
    Status(StatusLine),
}

impl MessageLine {
    pub fn parse<'p>(src: &'p Bytes) -> impl Fn(&str) -> IResult<&str, Self> + 'p {
        move |i| {
            alt((
                map(StatusLine::parse(src), MessageLine::Status),
                map(RequestLine::parse(src), MessageLine::Request),
            ))(i)
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, MessageLine::Request(..))
    }
}

/// Signals that the message head is not completely inside the parsed buffer
#[derive(Debug)]
pub struct Incomplete;

/// Pulls CRLF separated lines out of a message head.
///
/// Iteration ends at the empty line separating head and body. Yields
/// [`Incomplete`] when the buffer ran out before that line was found, in
/// which case [`PullParser::progress`] can be fed to a later instance once
/// more data arrived.
pub struct PullParser<'i> {
    src: &'i [u8],
    pos: usize,
    head_end: usize,
    complete: bool,
}

impl<'i> PullParser<'i> {
    pub fn new(src: &'i [u8], progress: usize) -> Self {
        Self {
            src,
            pos: progress,
            head_end: 0,
            complete: false,
        }
    }

    /// Offset of the first unconsumed line, valid after yielding [`Incomplete`]
    pub fn progress(&self) -> usize {
        self.pos
    }

    /// Offset of the first body byte, valid once iteration returned `None`
    pub fn head_end(&self) -> usize {
        self.head_end
    }
}

impl<'i> Iterator for PullParser<'i> {
    type Item = Result<&'i [u8], Incomplete>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.complete {
            return None;
        }

        let remaining = &self.src[self.pos..];

        let Some(idx) = remaining.iter().position(|&b| b == b'\n') else {
            return Some(Err(Incomplete));
        };

        let mut line = &remaining[..idx];
        if let [head @ .., b'\r'] = line {
            line = head;
        }

        self.pos += idx + 1;

        if line.is_empty() {
            self.complete = true;
            self.head_end = self.pos;
            return None;
        }

        Some(Ok(line))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseMessageError {
    #[error("message head is malformed")]
    Malformed,
    #[error("message has a body but no content-length header")]
    MissingContentLength,
    #[error("message body is shorter than its content-length")]
    TruncatedBody,
    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// A complete message received from the wire
#[derive(Debug, Clone)]
pub struct SipMessage {
    pub line: MessageLine,
    pub headers: Headers,
    pub body: Bytes,
}

impl SipMessage {
    /// Parse a complete message (head + body) out of one buffer.
    ///
    /// Folded header lines (continuations starting with whitespace) are
    /// flattened into the preceding header value.
    pub fn parse(src: impl Into<Bytes>) -> Result<Self, ParseMessageError> {
        use ParseMessageError::*;

        let src: Bytes = src.into();

        let mut parser = PullParser::new(&src, 0);
        let mut line = None;
        let mut headers = Headers::new();

        for item in &mut parser {
            let item = item.map_err(|Incomplete| Malformed)?;
            let item = from_utf8(item).map_err(|_| Malformed)?;

            if line.is_none() {
                match MessageLine::parse(&src)(item) {
                    Ok((_, parsed)) => line = Some(parsed),
                    Err(_) => return Err(Malformed),
                }
            } else if item.starts_with([' ', '\t']) {
                // folded continuation of the previous header value
                if !headers.fold_into_last(item.trim()) {
                    return Err(Malformed);
                }
            } else {
                let (name, value) = item.split_once(':').ok_or(Malformed)?;

                headers.insert(
                    Name::from_parse(&src, name.trim()),
                    BytesStr::from_parse(&src, value.trim()),
                );
            }
        }

        let line = line.ok_or(Malformed)?;

        let head_end = parser.head_end();
        if head_end == 0 {
            return Err(Malformed);
        }

        let body = match headers.try_get_parsed::<ContentLength>(&Name::CONTENT_LENGTH)? {
            Some(ContentLength(len)) => {
                if src.len() < head_end + len {
                    return Err(TruncatedBody);
                }

                src.slice(head_end..head_end + len)
            }
            None if src.len() > head_end => return Err(MissingContentLength),
            None => Bytes::new(),
        };

        Ok(Self {
            line,
            headers,
            body,
        })
    }

    pub fn is_request(&self) -> bool {
        self.line.is_request()
    }

    pub fn status(&self) -> Option<StatusCode> {
        match &self.line {
            MessageLine::Status(line) => Some(line.code),
            MessageLine::Request(..) => None,
        }
    }

    /// The request method, or for responses the method echoed in CSeq
    pub fn method(&self) -> Option<Method> {
        match &self.line {
            MessageLine::Request(line) => Some(line.method.clone()),
            MessageLine::Status(..) => self.cseq().ok().map(|cseq| cseq.method),
        }
    }

    pub fn call_id(&self) -> Result<CallId, HeaderError> {
        self.headers.get_named()
    }

    pub fn cseq(&self) -> Result<CSeq, HeaderError> {
        self.headers.get_named()
    }

    pub fn from_header(&self) -> Result<FromTo, HeaderError> {
        self.headers.get_parsed(&Name::FROM)
    }

    pub fn to_header(&self) -> Result<FromTo, HeaderError> {
        self.headers.get_parsed(&Name::TO)
    }

    pub fn from_tag(&self) -> Option<BytesStr> {
        self.from_header().ok()?.tag
    }

    pub fn to_tag(&self) -> Option<BytesStr> {
        self.to_header().ok()?.tag
    }

    /// The topmost (most recent) Via entry
    pub fn top_via(&self) -> Result<Via, HeaderError> {
        self.headers.get_parsed(&Name::VIA)
    }

    /// Branch parameter of the topmost Via
    pub fn branch(&self) -> Option<BytesStr> {
        self.top_via().ok()?.branch().cloned()
    }

    /// The digest challenge of a 401/407, with `true` for the proxy variant
    pub fn digest_challenge(&self) -> Result<Option<(DigestChallenge, bool)>, HeaderError> {
        if let Some(challenge) = self
            .headers
            .try_get_parsed::<DigestChallenge>(&Name::WWW_AUTHENTICATE)?
        {
            return Ok(Some((challenge, false)));
        }

        if let Some(challenge) = self
            .headers
            .try_get_parsed::<DigestChallenge>(&Name::PROXY_AUTHENTICATE)?
        {
            return Ok(Some((challenge, true)));
        }

        Ok(None)
    }
}

/// An outgoing request
#[derive(Debug, Clone)]
pub struct Request {
    pub line: RequestLine,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: SipUri) -> Self {
        Self {
            line: RequestLine { method, uri },
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Serialize into wire form.
    ///
    /// A Content-Length header matching the body is appended unless one was
    /// set explicitly.
    pub fn print(&self) -> Bytes {
        print_message(&self.line.to_string(), &self.headers, &self.body)
    }
}

/// An outgoing response
#[derive(Debug, Clone)]
pub struct Response {
    pub line: StatusLine,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(code: StatusCode) -> Self {
        let reason = code.reason_phrase().unwrap_or_default();

        Self {
            line: StatusLine {
                code,
                reason: BytesStr::from_static(reason),
            },
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn print(&self) -> Bytes {
        print_message(&self.line.to_string(), &self.headers, &self.body)
    }
}

fn print_message(line: &str, headers: &Headers, body: &Bytes) -> Bytes {
    use std::fmt::Write;

    let mut out = String::with_capacity(line.len() + 2 + 40 * headers.len() + 20);

    let _ = write!(out, "{line}\r\n{headers}");

    if !headers.contains(&Name::CONTENT_LENGTH) {
        let _ = write!(out, "Content-Length: {}\r\n", body.len());
    }

    out.push_str("\r\n");

    let mut out = out.into_bytes();
    out.extend_from_slice(body);

    Bytes::from(out)
}
