use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// The channel to the proxy is gone
    #[error("channel closed")]
    ChannelClosed,

    /// An inbound message was rejected by the parser
    #[error("received malformed message")]
    MalformedMessage,

    /// A transaction ran out of time waiting for a final response
    #[error("request timed out")]
    RequestTimedOut,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
