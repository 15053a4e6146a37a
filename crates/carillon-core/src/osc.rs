//! OSC (Open Sound Control) client for SuperCollider communication.
//!
//! OSC is the protocol used by SuperCollider's synthesis server (scsynth)
//! for real-time control. This module provides a simple UDP-based client
//! that can also wait for the server's replies.

use crate::errors::{CarillonError, Result};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

/// UDP-based OSC client for exchanging messages with scsynth.
pub struct OscClient {
    sock: UdpSocket,
    /// Resolved server address.
    pub addr: SocketAddr,
    /// Upper bound for any blocking receive.
    timeout: Duration,
}

impl OscClient {
    /// Bind `local` and target `remote`.
    ///
    /// # Arguments
    /// * `local` - Local endpoint, usually "127.0.0.1:0" for an ephemeral port
    /// * `remote` - The server address in "host:port" format
    /// * `timeout` - How long to wait for replies
    pub fn new(local: &str, remote: &str, timeout: Duration) -> Result<Self> {
        let addr = remote.to_socket_addrs()?.next().ok_or_else(|| {
            CarillonError::Config(format!("Could not resolve server address '{}'", remote))
        })?;
        let sock = UdpSocket::bind(local)?;
        sock.set_read_timeout(Some(timeout))?;
        log::debug!(
            "[OSC] Bound {} -> {}",
            sock.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| local.to_string()),
            addr
        );
        Ok(Self {
            sock,
            addr,
            timeout,
        })
    }

    /// The configured reply timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.sock.local_addr()?)
    }

    /// Send an OSC message with the given path and arguments.
    ///
    /// # Arguments
    /// * `path` - The OSC address pattern (e.g., "/s_new", "/d_recv")
    /// * `args` - The message arguments
    pub fn send_msg(&self, path: &str, args: Vec<OscType>) -> Result<()> {
        let buf = encoder::encode(&Self::msg(path, args))?;
        self.sock.send_to(&buf, self.addr)?;
        Ok(())
    }

    /// Create an OSC message packet.
    pub fn msg(path: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: path.into(),
            args,
        })
    }

    /// Receive one OSC packet, blocking for at most the configured timeout.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    pub fn recv_msg(&self) -> Result<Option<OscPacket>> {
        self.recv_within(self.timeout)
    }

    /// Receive one OSC packet, blocking for at most `wait`.
    fn recv_within(&self, wait: Duration) -> Result<Option<OscPacket>> {
        if wait.is_zero() {
            return Ok(None);
        }
        self.sock.set_read_timeout(Some(wait))?;
        let mut buf = [0u8; 65536];
        match self.sock.recv_from(&mut buf) {
            Ok((size, _)) => {
                let (_, packet) = rosc::decoder::decode_udp(&buf[..size])?;
                Ok(Some(packet))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wait until `select` accepts a received message, or the timeout runs out.
    ///
    /// Messages `select` returns `None` for are logged and skipped, as are
    /// packets that fail to decode. Bundles are flattened.
    pub fn wait_for<T>(
        &self,
        command: &str,
        mut select: impl FnMut(&OscMessage) -> Option<T>,
    ) -> Result<T> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let packet = match self.recv_within(remaining) {
                Ok(Some(packet)) => packet,
                Ok(None) => continue,
                Err(CarillonError::Osc(e)) => {
                    log::debug!("[OSC] Skipping undecodable packet while waiting for {}: {}", command, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for msg in flatten(packet) {
                if let Some(found) = select(&msg) {
                    return Ok(found);
                }
                log::debug!("[OSC] Ignoring {} while waiting for {}", msg.addr, command);
            }
        }
        Err(CarillonError::Timeout {
            command: command.to_string(),
            timeout: self.timeout,
        })
    }
}

fn flatten(packet: OscPacket) -> Vec<OscMessage> {
    match packet {
        OscPacket::Message(msg) => vec![msg],
        OscPacket::Bundle(bundle) => bundle.content.into_iter().flat_map(flatten).collect(),
    }
}

impl std::fmt::Debug for OscClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscClient")
            .field("addr", &self.addr)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
