#![warn(unreachable_pub)]
//! Outbound SIP calls with an RTP media engine.
//!
//! [`SipCall`] drives a digest-authenticated INVITE dialog against a proxy
//! and, once the call is answered, exchanges G.711 audio with the peer over
//! RTP. Caller audio is pushed through [`CallHandler`], received DTMF keys
//! are read from [`DtmfCollector`], and received audio can be exported as a
//! WAV file.

mod call;
mod call_handler;
mod config;
mod dtmf;
mod error;
mod events;
mod media;
mod wav;

pub use call::SipCall;
pub use call_handler::CallHandler;
pub use config::{CallOptions, MediaConfig};
pub use dtmf::DtmfCollector;
pub use error::CallError;
pub use events::CallState;
pub use media::CodecKind;

pub use sip_core::transport::TransportKind;
