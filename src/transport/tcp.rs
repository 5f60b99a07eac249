//! # TCP Transport
//!
//! Dial and accept helpers that hand out started [`Conn`]s over TCP.
//!
//! The server side runs an accept loop with a connection cap and graceful shutdown:
//! on shutdown it stops accepting, cancels every open connection and waits (up to the
//! configured shutdown timeout) for their handlers to finish.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::MessageFactory;
use crate::service::conn::Conn;
use crate::utils::timeout::with_timeout_error;

/// Connect to `addr`, wrap the stream and start the connection loops.
#[instrument(skip(factory, config))]
pub async fn connect(
    addr: &str,
    factory: Arc<MessageFactory>,
    config: &NetworkConfig,
) -> Result<Conn<TcpStream>> {
    let stream = with_timeout_error(
        async { TcpStream::connect(addr).await.map_err(ProtocolError::from) },
        config.client.connect_timeout,
    )
    .await?;

    let conn = Conn::wrap_tcp(stream, factory, config.connection.clone());
    conn.start()?;
    info!(local = ?conn.local_addr(), peer = ?conn.peer_addr(), "Connected");
    Ok(conn)
}

/// Bind `config.server.address` and serve until Ctrl-C.
#[instrument(skip(factory, config, handler), fields(address = %config.server.address))]
pub async fn start_server<F, Fut>(
    config: NetworkConfig,
    factory: Arc<MessageFactory>,
    handler: F,
) -> Result<()>
where
    F: Fn(Arc<Conn<TcpStream>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&config.server.address).await?;

    // Create internal shutdown channel
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(listener, config, factory, shutdown_rx, handler).await
}

/// Accept connections on `listener` until `shutdown_rx` fires (or its sender drops).
///
/// Every accepted stream is wrapped, started and passed to `handler` on its own task.
/// The connection is closed when the handler returns.
#[instrument(skip_all, fields(address = ?listener.local_addr().ok()))]
pub async fn start_server_with_shutdown<F, Fut>(
    listener: TcpListener,
    config: NetworkConfig,
    factory: Arc<MessageFactory>,
    mut shutdown_rx: mpsc::Receiver<()>,
    handler: F,
) -> Result<()>
where
    F: Fn(Arc<Conn<TcpStream>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    info!("Listening");

    let handler = Arc::new(handler);
    let active_connections = Arc::new(AtomicUsize::new(0));
    let shutdown = CancellationToken::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for connections to close...");
                shutdown.cancel();
                drain(&active_connections, config.server.shutdown_timeout).await;
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        if active_connections.load(Ordering::Acquire) >= config.server.max_connections {
                            warn!(peer = %peer, limit = config.server.max_connections, "Connection limit reached, rejecting");
                            drop(stream);
                            continue;
                        }
                        accept_one(
                            stream,
                            peer,
                            &config,
                            factory.clone(),
                            shutdown.child_token(),
                            active_connections.clone(),
                            handler.clone(),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

fn accept_one<F, Fut>(
    stream: TcpStream,
    peer: SocketAddr,
    config: &NetworkConfig,
    factory: Arc<MessageFactory>,
    cancel: CancellationToken,
    active_connections: Arc<AtomicUsize>,
    handler: Arc<F>,
) where
    F: Fn(Arc<Conn<TcpStream>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let conn = Arc::new(Conn::wrap_tcp(stream, factory, config.connection.clone()));
    if let Err(e) = conn.start_with_cancel(cancel) {
        error!(peer = %peer, error = %e, "Failed to start connection");
        return;
    }

    active_connections.fetch_add(1, Ordering::AcqRel);
    info!(peer = %peer, conn = conn.id(), "New connection established");

    tokio::spawn(async move {
        handler(conn.clone()).await;
        let _ = conn.close();
        active_connections.fetch_sub(1, Ordering::AcqRel);
        info!(peer = %peer, conn = conn.id(), "Connection closed");
    });
}

async fn drain(active_connections: &AtomicUsize, limit: Duration) {
    let timeout = tokio::time::sleep(limit);
    tokio::pin!(timeout);

    loop {
        let connections = active_connections.load(Ordering::Acquire);
        if connections == 0 {
            info!("All connections closed, shutting down");
            return;
        }

        tokio::select! {
            _ = &mut timeout => {
                warn!(connections, "Shutdown timeout reached, forcing exit");
                return;
            }
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                debug!(connections, "Waiting for connections to close");
            }
        }
    }
}
