//! Minimal HTTP CONNECT proxy that tunnels every request to one upstream.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{copy_bidirectional, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct ConnectProxy {
    listener: TcpListener,
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ConnectProxy {
    pub async fn new() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shared log of CONNECT request lines.
    pub fn requests(&self) -> Arc<Mutex<Vec<String>>> {
        self.requests.clone()
    }

    pub fn start(self, upstream: SocketAddr) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok((client, _)) = self.listener.accept().await {
                let requests = self.requests.clone();
                tokio::spawn(async move {
                    if let Err(e) = tunnel(client, upstream, requests).await {
                        tracing::debug!("proxy tunnel failed: {}", e);
                    }
                });
            }
        })
    }
}

async fn tunnel(
    mut client: TcpStream,
    upstream: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if client.read(&mut byte).await? == 0 {
            return Ok(());
        }
        head.push(byte[0]);
    }
    let head = String::from_utf8_lossy(&head);
    let line = head.lines().next().unwrap_or_default().to_string();
    requests.lock().unwrap().push(line);

    let mut server = TcpStream::connect(upstream).await?;
    client
        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
        .await?;
    copy_bidirectional(&mut client, &mut server).await?;
    Ok(())
}
