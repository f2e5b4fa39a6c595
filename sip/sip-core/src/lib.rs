#![warn(unreachable_pub)]
//! Transport channels and transaction state, the lower half of the SIP stack.
//!
//! [`transport::Channel`] is a frame preserving duplex pipe to the proxy,
//! [`transaction::Transactions`] tracks per-branch request state including
//! UDP retransmissions and timeouts.

mod error;

pub mod transaction;
pub mod transport;

pub use error::{Error, Result};
