//! Solves the digest challenges SIP proxies respond with (RFC 2617, MD5 only)

mod digest;

pub use digest::{DigestAuthenticator, DigestCredentials, DigestError};
