use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::crtp;
use crate::error::{PollFailure, TransportFailure};

/// Largest datagram we expect from a drone; anything longer is truncated.
const RECV_BUF_LEN: usize = 64;

/// Datagram channel between the link session and a drone.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one frame as a single datagram.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportFailure>;

    /// Waits up to `wait` for a datagram from the drone and returns the
    /// newest one queued, preferring well-formed telemetry.
    async fn recv_latest(&self, wait: Duration) -> Result<Vec<u8>, PollFailure>;
}

/// One UDP socket used both for commands and for telemetry.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    drone_addr: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(config: &LinkConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(config.listen_addr).await?;
        info!(
            "Link socket bound on {}, drone at {}",
            socket.local_addr()?,
            config.drone_addr
        );
        Ok(Self {
            socket,
            drone_addr: config.drone_addr,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportFailure> {
        let sent = self.socket.send_to(frame, self.drone_addr).await?;
        trace!("Sent {} bytes to {}", sent, self.drone_addr);
        Ok(())
    }

    async fn recv_latest(&self, wait: Duration) -> Result<Vec<u8>, PollFailure> {
        let deadline = Instant::now() + wait;
        let mut buf = [0u8; RECV_BUF_LEN];

        let mut latest = loop {
            let (len, from) = timeout_at(deadline, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| PollFailure::Timeout(wait))??;
            if from == self.drone_addr {
                break buf[..len].to_vec();
            }
            debug!("Ignoring {} bytes from unknown peer {}", len, from);
        };
        let mut skipped = 0usize;

        // Older frames are useless once a newer telemetry frame is queued,
        // but a good frame is never traded for junk.
        loop {
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, from)) if from != self.drone_addr => {
                    debug!("Ignoring {} bytes from unknown peer {}", len, from);
                }
                Ok((len, _)) => {
                    let frame = &buf[..len];
                    if is_telemetry(frame) || !is_telemetry(&latest) {
                        latest = frame.to_vec();
                    }
                    skipped += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Stopped draining telemetry socket: {}", e);
                    break;
                }
            }
        }

        if skipped > 0 {
            debug!(
                "Skipped {} queued datagrams from {}",
                skipped, self.drone_addr
            );
        }
        Ok(latest)
    }
}

fn is_telemetry(frame: &[u8]) -> bool {
    crtp::decode_telemetry(frame).is_ok()
}
