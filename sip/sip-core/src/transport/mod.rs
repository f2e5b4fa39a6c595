//! The duplex byte channel carrying SIP messages to and from the proxy.
//!
//! UDP preserves message boundaries by itself, stream transports are framed
//! with [`StreamingDecoder`] which splits messages by Content-Length.

use crate::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;

mod streaming;

#[cfg(feature = "tls-native-tls")]
mod native_tls;

use streaming::StreamingDecoder;

const MAX_MSG_SIZE: usize = u16::MAX as usize;

/// The configured transport towards the proxy.
///
/// `TlsV1` forces the minimum accepted protocol version down to TLS 1.0 for
/// gear that never got updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Udp,
    Tcp,
    Tls,
    TlsV1,
}

impl TransportKind {
    /// The token printed into Via headers and `transport=` URI parameters
    pub fn sip_name(self) -> &'static str {
        match self {
            TransportKind::Udp => "UDP",
            TransportKind::Tcp => "TCP",
            TransportKind::Tls | TransportKind::TlsV1 => "TLS",
        }
    }

    /// Reliable transports disable transaction retransmissions
    pub fn reliable(self) -> bool {
        !matches!(self, TransportKind::Udp)
    }
}

impl FromStr for TransportKind {
    type Err = InvalidTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("UDP") {
            Ok(TransportKind::Udp)
        } else if s.eq_ignore_ascii_case("TCP") {
            Ok(TransportKind::Tcp)
        } else if s.eq_ignore_ascii_case("TLS") {
            Ok(TransportKind::Tls)
        } else if s.eq_ignore_ascii_case("TLSv1") {
            Ok(TransportKind::TlsV1)
        } else {
            Err(InvalidTransport)
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::TlsV1 => f.write_str("TLSv1"),
            _ => f.write_str(self.sip_name()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid transport, expected one of UDP, TCP, TLS, TLSv1")]
pub struct InvalidTransport;

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// A connected, frame preserving duplex channel to the proxy
pub struct Channel {
    kind: TransportKind,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    inner: Inner,
}

enum Inner {
    Udp(Arc<UdpSocket>),
    Stream {
        read: FramedRead<BoxedRead, StreamingDecoder>,
        write: BoxedWrite,
    },
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:bound={},peer={}",
            self.kind.sip_name().to_ascii_lowercase(),
            self.local_addr,
            self.peer_addr
        )
    }
}

impl Channel {
    /// Resolve `proxy` (`host:port`) and connect with the given transport
    pub async fn connect(kind: TransportKind, proxy: &str) -> Result<Self> {
        let peer_addr = lookup_host(proxy)
            .await?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "proxy did not resolve"))?;

        match kind {
            TransportKind::Udp => {
                let socket = UdpSocket::bind("0.0.0.0:0").await?;
                socket.connect(peer_addr).await?;

                let local_addr = socket.local_addr()?;

                log::info!("bound UDP to {local_addr}, peer {peer_addr}");

                Ok(Self {
                    kind,
                    local_addr,
                    peer_addr,
                    inner: Inner::Udp(Arc::new(socket)),
                })
            }
            TransportKind::Tcp => {
                let stream = TcpStream::connect(peer_addr).await?;
                let local_addr = stream.local_addr()?;

                log::info!("connected TCP {local_addr} -> {peer_addr}");

                let (read, write) = stream.into_split();

                Ok(Self::from_stream_halves(
                    kind,
                    local_addr,
                    peer_addr,
                    Box::new(read),
                    Box::new(write),
                ))
            }
            #[cfg(feature = "tls-native-tls")]
            TransportKind::Tls | TransportKind::TlsV1 => {
                let host = proxy.rsplit_once(':').map_or(proxy, |(host, _)| host);

                let (local_addr, read, write) =
                    native_tls::connect(kind, host, peer_addr).await?;

                log::info!("connected TLS {local_addr} -> {peer_addr}");

                Ok(Self::from_stream_halves(kind, local_addr, peer_addr, read, write))
            }
            #[cfg(not(feature = "tls-native-tls"))]
            TransportKind::Tls | TransportKind::TlsV1 => Err(Error::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "TLS support is not compiled in",
            ))),
        }
    }

    fn from_stream_halves(
        kind: TransportKind,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        read: BoxedRead,
        write: BoxedWrite,
    ) -> Self {
        Self {
            kind,
            local_addr,
            peer_addr,
            inner: Inner::Stream {
                read: FramedRead::new(read, StreamingDecoder::default()),
                write,
            },
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Split into independently owned send and receive halves
    pub fn split(self) -> (ChannelTx, ChannelRx) {
        let (tx_inner, rx_inner) = match self.inner {
            Inner::Udp(socket) => (TxInner::Udp(socket.clone()), RxInner::Udp(socket)),
            Inner::Stream { read, write } => (TxInner::Stream(write), RxInner::Stream(read)),
        };

        (
            ChannelTx {
                kind: self.kind,
                local_addr: self.local_addr,
                peer_addr: self.peer_addr,
                inner: tx_inner,
            },
            ChannelRx { inner: rx_inner },
        )
    }
}

/// Send half of a [`Channel`]
pub struct ChannelTx {
    kind: TransportKind,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    inner: TxInner,
}

enum TxInner {
    Udp(Arc<UdpSocket>),
    Stream(BoxedWrite),
    Closed,
}

impl ChannelTx {
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Write one message to the proxy.
    ///
    /// Errors are hard errors, the channel is unusable afterwards.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.inner {
            TxInner::Udp(socket) => {
                socket.send(bytes).await?;
                Ok(())
            }
            TxInner::Stream(write) => {
                write.write_all(bytes).await?;
                write.flush().await?;
                Ok(())
            }
            TxInner::Closed => Err(Error::ChannelClosed),
        }
    }

    /// Drop the underlying socket handle. Idempotent, any following
    /// [`ChannelTx::send`] returns [`Error::ChannelClosed`].
    pub async fn close(&mut self) {
        if let TxInner::Stream(write) = &mut self.inner {
            let _ = write.shutdown().await;
        }

        self.inner = TxInner::Closed;
    }
}

/// Receive half of a [`Channel`], yielding one message per call
pub struct ChannelRx {
    inner: RxInner,
}

enum RxInner {
    Udp(Arc<UdpSocket>),
    Stream(FramedRead<BoxedRead, StreamingDecoder>),
}

impl ChannelRx {
    /// Receive the next message: one datagram for UDP, one Content-Length
    /// framed message for stream transports.
    pub async fn recv(&mut self) -> Result<Bytes> {
        match &mut self.inner {
            RxInner::Udp(socket) => {
                let mut buffer = vec![0u8; MAX_MSG_SIZE];

                let len = socket.recv(&mut buffer).await.map_err(|_| Error::ChannelClosed)?;
                buffer.truncate(len);

                Ok(Bytes::from(buffer))
            }
            RxInner::Stream(framed) => match framed.next().await {
                Some(Ok(message)) => Ok(message),
                Some(Err(streaming::Error::Io(..))) | None => Err(Error::ChannelClosed),
                Some(Err(_)) => Err(Error::MalformedMessage),
            },
        }
    }
}
