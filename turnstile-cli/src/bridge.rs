//! Byte pumping between a device connection and a TCP stream

use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Which side ran dry first, and how many bytes it had sent across
#[derive(Debug, PartialEq, Eq)]
pub enum Ended {
    Device(u64),
    Tcp(u64),
}

/// Copy in both directions until either side reaches EOF.
///
/// Serial devices rarely report EOF, so waiting for both directions would
/// hang once the TCP peer is gone.
pub async fn bridge<D, T>(device: &mut D, tcp: &mut T) -> io::Result<Ended>
where
    D: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (mut device_rx, mut device_tx) = tokio::io::split(device);
    let (mut tcp_rx, mut tcp_tx) = tokio::io::split(tcp);

    tokio::select! {
        sent = tokio::io::copy(&mut device_rx, &mut tcp_tx) => sent.map(Ended::Device),
        sent = tokio::io::copy(&mut tcp_rx, &mut device_tx) => sent.map(Ended::Tcp),
    }
}

/// Resolves when the TCP client hangs up before sending anything
pub async fn client_gone(stream: &TcpStream) {
    let mut buf = [0u8; 1];
    match stream.peek(&mut buf).await {
        Ok(0) | Err(_) => {}
        // Client is talking; only the bridge can notice a hangup now
        Ok(_) => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_bridge_both_directions() {
        let (mut device, mut device_peer) = duplex(256);
        let (mut tcp, mut tcp_peer) = duplex(256);

        let pump = tokio::spawn(async move { bridge(&mut device, &mut tcp).await });

        device_peer.write_all(b"from device").await.unwrap();
        let mut buf = [0u8; 11];
        tcp_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"from device");

        tcp_peer.write_all(b"from tcp").await.unwrap();
        let mut buf = [0u8; 8];
        device_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"from tcp");

        drop(tcp_peer);
        let ended = pump.await.unwrap().unwrap();
        assert_eq!(ended, Ended::Tcp(8));
    }

    #[tokio::test]
    async fn test_bridge_ends_on_device_eof() {
        let (mut device, device_peer) = duplex(256);
        let (mut tcp, _tcp_peer) = duplex(256);
        drop(device_peer);

        let ended = tokio::time::timeout(Duration::from_secs(1), bridge(&mut device, &mut tcp))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ended, Ended::Device(0));
    }

    #[tokio::test]
    async fn test_client_gone() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        drop(client);

        tokio::time::timeout(Duration::from_secs(1), client_gone(&server_side))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_client_talking_is_not_gone() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        client.write_all(b"GET").await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), client_gone(&server_side)).await;
        assert!(result.is_err());

        // Peeked bytes are still there
        let mut server_side = server_side;
        let mut buf = [0u8; 3];
        server_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"GET");
    }
}
