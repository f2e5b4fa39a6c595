use super::{BoxedRead, BoxedWrite, TransportKind};
use crate::Result;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_native_tls::native_tls::{Protocol, TlsConnector};

/// Connect a TLS stream to the proxy and hand back boxed halves.
///
/// `TransportKind::TlsV1` lowers the minimum protocol version to TLS 1.0,
/// everything else uses the library defaults.
pub(super) async fn connect(
    kind: TransportKind,
    host: &str,
    peer_addr: SocketAddr,
) -> Result<(SocketAddr, BoxedRead, BoxedWrite)> {
    let mut builder = TlsConnector::builder();

    if kind == TransportKind::TlsV1 {
        builder.min_protocol_version(Some(Protocol::Tlsv10));
    }

    let connector = builder
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    let stream = TcpStream::connect(peer_addr).await?;
    let local_addr = stream.local_addr()?;

    let stream = connector
        .connect(host, stream)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let (read, write) = tokio::io::split(stream);

    Ok((local_addr, Box::new(read), Box::new(write)))
}
