use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::Result;
use crate::radius::RADIUS_MAX_LEN;
use crate::transport::{ShutdownSignal, Transport};

/// UDP socket talking to exactly one RADIUS server. Datagrams from any other
/// source are dropped.
pub struct RadiusSocket {
    socket: UdpSocket,
    server: SocketAddr,
    shutdown: ShutdownSignal,
}

impl RadiusSocket {
    pub async fn bind(listen: SocketAddr, server: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(listen).await?;
        info!("RADIUS client listening on {}, server {}", socket.local_addr()?, server);
        Ok(RadiusSocket {
            socket,
            server,
            shutdown: ShutdownSignal::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Transport for RadiusSocket {
    async fn send(&self, data: &[u8]) -> Result<()> {
        self.socket.send_to(data, self.server).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; RADIUS_MAX_LEN];
        loop {
            if self.shutdown.is_triggered() {
                return Ok(None);
            }
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    let (len, src) = received?;
                    if src != self.server {
                        debug!("Ignoring {} bytes from {}, not the RADIUS server", len, src);
                        continue;
                    }
                    return Ok(Some(buf[..len].to_vec()));
                }
                _ = self.shutdown.triggered() => return Ok(None),
            }
        }
    }

    fn shutdown(&self) {
        self.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_only_server_datagrams_are_received() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = RadiusSocket::bind("127.0.0.1:0".parse().unwrap(), server.local_addr().unwrap())
            .await
            .unwrap();
        let local = socket.local_addr().unwrap();

        socket.send(b"request").await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"request");
        assert_eq!(from, local);

        stranger.send_to(b"noise", local).await.unwrap();
        server.send_to(b"answer", local).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), socket.receive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, Some(b"answer".to_vec()));
    }

    #[tokio::test]
    async fn test_shutdown_returns_none() {
        let socket = RadiusSocket::bind("127.0.0.1:0".parse().unwrap(), "127.0.0.1:1812".parse().unwrap())
            .await
            .unwrap();
        socket.shutdown();
        assert_eq!(socket.receive().await.unwrap(), None);
    }
}
