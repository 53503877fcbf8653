//! TCP/IP stack fingerprinting for browser impersonation.
//!
//! Socket options observable before the TLS handshake (p0f-style):
//! receive/send buffer size, which drives the advertised window, and TTL.
//! MSS, window scaling, SACK and timestamps are negotiated by the kernel.

use std::io;

/// TCP/IP fingerprint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpFingerprint {
    /// Socket buffer size in bytes.
    pub window_size: u32,
    /// Initial TTL for IPv4 packets. macOS/Linux: 64, Windows: 128.
    pub ttl: u8,
    /// Disable Nagle's algorithm. Browsers do.
    pub nodelay: bool,
}

impl Default for TcpFingerprint {
    fn default() -> Self {
        Self {
            window_size: 65535,
            ttl: 64,
            nodelay: true,
        }
    }
}

impl TcpFingerprint {
    /// Browser running on macOS or Linux.
    pub fn unix() -> Self {
        Self::default()
    }

    /// Browser running on Windows.
    pub fn windows() -> Self {
        Self {
            window_size: 64240,
            ttl: 128,
            nodelay: true,
        }
    }
}

/// Configure a TCP socket with fingerprint settings.
pub fn configure_tcp_socket(
    socket: &socket2::Socket,
    fp: &TcpFingerprint,
    ipv4: bool,
) -> io::Result<()> {
    socket.set_recv_buffer_size(fp.window_size as usize)?;
    socket.set_send_buffer_size(fp.window_size as usize)?;
    socket.set_tcp_nodelay(fp.nodelay)?;
    if ipv4 {
        socket.set_ttl_v4(fp.ttl as u32)?;
    }
    Ok(())
}
