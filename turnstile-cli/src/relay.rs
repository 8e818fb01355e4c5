//! Accept and dial loops between a gate and TCP

use std::future::Future;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use turnstile::{Connection, Open, ReopenDialer, ReopenError, ReopenListener};

use crate::bridge::{bridge, client_gone, Ended};

/// Pause before reopening the device when the upstream refused us
const UPSTREAM_RETRY: Duration = Duration::from_secs(1);

/// Forward every device connection to `upstream` until the listener closes
pub async fn serve<O: Open>(listener: &ReopenListener<O>, upstream: &str) -> Result<()> {
    loop {
        let mut conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(ReopenError::Closed) => break,
            Err(e) => return Err(e.into()),
        };
        info!("Device {} open", conn.local_addr());

        match TcpStream::connect(upstream).await {
            Ok(mut tcp) => {
                tcp.set_nodelay(true).ok();
                match bridge(&mut conn, &mut tcp).await {
                    Ok(Ended::Device(n)) => info!("Device closed after {} bytes", n),
                    Ok(Ended::Tcp(n)) => info!("Upstream closed after {} bytes", n),
                    Err(e) => warn!("Bridge error: {}", e),
                }
            }
            Err(e) => {
                error!("Upstream {} unreachable: {}", upstream, e);
                tokio::time::sleep(UPSTREAM_RETRY).await;
            }
        }

        if let Err(e) = conn.close().await {
            warn!("Closing device: {}", e);
        }
    }

    Ok(())
}

/// Carry each TCP client over the dialer until `shutdown` resolves
pub async fn dial<O: Open>(
    dialer: Arc<ReopenDialer<O>>,
    tcp: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut shutdown = pin!(shutdown);
    loop {
        tokio::select! {
            () = shutdown.as_mut() => {
                info!("Shutting down");
                dialer.close();
                break;
            }
            accepted = tcp.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("TCP connection from {}", peer);
                    stream.set_nodelay(true).ok();
                    tokio::spawn(carry(Arc::clone(&dialer), stream, peer));
                }
                Err(e) => error!("Accept error: {}", e),
            },
        }
    }

    Ok(())
}

/// Wait for the device, then pump one TCP client across it
pub async fn carry<O: Open>(dialer: Arc<ReopenDialer<O>>, mut stream: TcpStream, peer: SocketAddr) {
    let dialed = dialer
        .dial_with(&peer.to_string(), client_gone(&stream))
        .await;
    let mut conn = match dialed {
        Ok(conn) => conn,
        Err(e) => {
            warn!("Gave up on {}: {}", peer, e);
            return;
        }
    };

    match bridge(&mut conn, &mut stream).await {
        Ok(Ended::Device(n)) => info!("Device closed on {} after {} bytes", peer, n),
        Ok(Ended::Tcp(n)) => info!("{} hung up after {} bytes", peer, n),
        Err(e) => warn!("Bridge error for {}: {}", peer, e),
    }

    if let Err(e) = conn.close().await {
        warn!("Closing device: {}", e);
    }
}
