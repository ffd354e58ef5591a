use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use crate::auth::SessionValidator;
use crate::http::connection::Connection;
use crate::proxy::ProxyHandler;

/// Pause after a failed accept, so fd exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of inbound connections.
pub trait Accept: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

pub async fn run<V: SessionValidator>(
    listen_addr: &str,
    handler: Arc<ProxyHandler<V>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!("Listening on {}", listen_addr);

    serve(listener, handler).await
}

/// Accepts connections until the task is dropped, one task per connection.
///
/// Accept errors (`EMFILE`, `ECONNABORTED`, ...) affect a single attempt and
/// never stop the listener.
pub async fn serve<A: Accept, V: SessionValidator>(
    listener: A,
    handler: Arc<ProxyHandler<V>>,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        tracing::debug!("Accepted connection from {}", peer);

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer, handler);
            if let Err(e) = conn.run().await {
                tracing::warn!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
