use sip_core::transport::TransportKind;
use std::ops::Range;

/// Everything needed to place a call. Construction does no I/O.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// SIP account name, also the user part of From/Contact
    pub username: String,
    pub password: String,

    /// Proxy/registrar as `host:port`
    pub proxy: String,

    /// User part of the callee URI, typically a phone number
    pub callee: String,

    pub transport: TransportKind,

    /// Display name shown to the callee
    pub caller_id: Option<String>,

    /// Ports to pick the local RTP port from
    pub rtp_port_range: Range<u16>,

    pub media: MediaConfig,
}

impl CallOptions {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        proxy: impl Into<String>,
        callee: impl Into<String>,
        transport: TransportKind,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            proxy: proxy.into(),
            callee: callee.into(),
            transport,
            caller_id: None,
            rtp_port_range: 10000..20000,
            media: MediaConfig::default(),
        }
    }

    /// The host part of the proxy address
    pub(crate) fn proxy_host(&self) -> &str {
        self.proxy
            .rsplit_once(':')
            .map_or(self.proxy.as_str(), |(host, _)| host)
    }
}

/// Tunables of the media engine
#[derive(Debug, Clone, Copy)]
pub struct MediaConfig {
    /// Scales the sleep between RTP frames. Values below 1 make the sender
    /// run slightly ahead of wall clock, which keeps the peer's jitter
    /// buffer filled. The default matches observed peer behavior.
    pub pace_factor: f32,

    /// Recording ring capacity in frames (20 ms each), oldest are dropped
    /// on overflow
    pub record_capacity: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            pace_factor: 1.0 / 1.75,
            record_capacity: 500,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let options = CallOptions::new("alice", "secret", "example.com:5060", "100", TransportKind::Udp);

        assert_eq!(options.rtp_port_range, 10000..20000);
        assert_eq!(options.proxy_host(), "example.com");
        assert_eq!(options.media.record_capacity, 500);
        assert!(options.media.pace_factor < 1.0);
    }
}
