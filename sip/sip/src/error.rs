use sip_types::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Core(#[from] sip_core::Error),

    #[error(transparent)]
    Auth(#[from] sip_auth::DigestError),

    /// Digest retries exhausted
    #[error("unable to authenticate, check credentials")]
    AuthFailed,

    /// 486 / 600 / 603
    #[error("callee is busy ({0})")]
    Busy(StatusCode),

    /// 404 / 480 / 408 or INVITE transaction timeout
    #[error("callee unreachable ({0})")]
    CalleeUnreachable(StatusCode),

    /// Any other terminal response
    #[error("call failed with status {0}")]
    Failed(StatusCode),

    #[error("remote offered no supported codec")]
    NoSupportedCodec,

    /// The audio input queue is gone, no frames can be delivered
    #[error("no audio stream attached to the call")]
    AudioStream,

    #[error(transparent)]
    Header(#[from] sip_types::HeaderError),

    #[error("invalid sdp in response: {0}")]
    Sdp(#[from] sdp_types::ParseSessionDescriptionError),

    #[error("failed to write recording: {0}")]
    Recording(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
