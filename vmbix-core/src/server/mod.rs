//! TCP listener and per-connection request handling.
//!
//! The listener only accepts and submits; the worker that claims a socket
//! reads one request, dispatches it, writes one reply and closes.

mod pool;
mod stats;

pub use pool::{JobHandler, Rejected, WorkerPool, CLAIM_INTERVAL, IDLE_LIMIT};
pub use stats::ServerStats;

use crate::dispatch::Dispatcher;
use crate::error::{Result, VmbixError};
use crate::handlers::Services;
use crate::protocol;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

/// Serves one claimed connection.
pub struct ConnectionHandler {
    dispatcher: Arc<Dispatcher<Services>>,
    services: Arc<Services>,
    read_timeout: Duration,
}

impl ConnectionHandler {
    pub fn new(dispatcher: Arc<Dispatcher<Services>>, services: Arc<Services>, read_timeout: Duration) -> Self {
        Self { dispatcher, services, read_timeout }
    }

    async fn serve(&self, stream: &mut TcpStream) -> Result<()> {
        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half);

        let request = tokio::time::timeout(self.read_timeout, protocol::read_request(&mut reader))
            .await
            .map_err(|_| VmbixError::Protocol { reason: "read timeout".to_string() })??;
        let Some(line) = request else {
            debug!("Peer closed without a request");
            return Ok(());
        };
        debug!(command = %line, "Request received");

        match self.dispatcher.dispatch(&self.services, &line).await {
            Some(reply) => protocol::write_reply(&mut write_half, &reply).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JobHandler<TcpStream> for ConnectionHandler {
    async fn handle(&self, mut stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        if let Err(e) = self.serve(&mut stream).await {
            warn!(peer = ?peer, error = %e, "Connection failed");
        }
        // The connection is closed on drop either way.
        let _ = stream.shutdown().await;
    }
}

/// Bound listening socket.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    #[instrument]
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Listening for Zabbix requests");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept forever, handing every connection to the pool. Rejected
    /// connections are closed without a reply.
    pub async fn run(self, pool: Arc<WorkerPool<TcpStream>>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Accepted connection");
                    if let Err(Rejected(stream)) = pool.submit(stream) {
                        drop(stream);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
