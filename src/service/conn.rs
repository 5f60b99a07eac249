//! # Connection Orchestrator
//!
//! [`Conn`] wraps a raw duplex stream and runs three cooperating loops over it:
//!
//! - **send**: drains the outbound queue, packs each message into a frame, writes it
//! - **receive**: scans frames, decodes them through the [`MessageFactory`], pushes the
//!   messages onto the inbound queue and tracks liveness
//! - **heartbeat** (optional): enqueues a [`Heartbeat`] with an increasing serial number
//!   on every tick
//!
//! The loops run under one supervisor task and share one cancellation token. Any
//! fatal condition in any loop (malformed frame, I/O failure, pack failure, idle
//! timeout, panic) collapses to the same action: [`Conn::close`]. Nothing is retried;
//! once a frame is lost there is no way to resynchronize the byte stream.
//!
//! ## Lifecycle
//! `wrap` → `start` → running → closed. Closed is terminal and `close` is idempotent.
//!
//! ## Backpressure
//! `send_message` waits while the outbound queue is full. On the receive side a slow
//! consumer stalls the receive loop, which stops reading the socket and lets the
//! transport's own flow control push back on the peer.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, trace, warn, Instrument};

use crate::config::ConnectionConfig;
use crate::core::codec::FrameCodec;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::panic_message;
use crate::protocol::{Heartbeat, Message, MessageFactory};
use crate::utils::metrics::{global_metrics, ConnStats, ConnStatsSnapshot};

type Outbound = mpsc::Receiver<Box<dyn Message>>;
type Inbound = mpsc::Sender<Box<dyn Message>>;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// State shared between the handle and the loops.
struct Shared {
    id: u64,
    closed: AtomicBool,
    cancel: CancellationToken,
    outbound_tx: mpsc::Sender<Box<dyn Message>>,
    // Dropped on close so the inbound channel ends once the receive loop exits.
    inbound_tx: Mutex<Option<Inbound>>,
    stats: ConnStats,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flip the closed flag. Only the first caller does any work.
    fn shutdown(&self, cause: Option<&ProtocolError>) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.cancel.cancel();
        if let Ok(mut inbound) = self.inbound_tx.lock() {
            inbound.take();
        }

        match cause {
            Some(err) if err.is_remote() => info!(conn = self.id, error = %err, "Connection closed"),
            Some(err) => warn!(conn = self.id, error = %err, "Connection closed"),
            None => debug!(conn = self.id, "Connection closed"),
        }
        true
    }

    async fn send(&self, msg: Box<dyn Message>) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProtocolError::ConnectionClosed),
            res = self.outbound_tx.send(msg) => res.map_err(|_| ProtocolError::ConnectionClosed),
        }
    }
}

/// A message connection over a duplex byte stream.
///
/// `Conn` owns the stream exclusively; once wrapped, nothing else may read or write
/// it. Share a `Conn` between tasks with `Arc<Conn<_>>`: every method takes `&self`.
pub struct Conn<S> {
    shared: Arc<Shared>,
    stream: Mutex<Option<S>>,
    outbound_rx: Mutex<Option<Outbound>>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<Box<dyn Message>>>,
    factory: Arc<MessageFactory>,
    config: ConnectionConfig,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl<S> std::fmt::Debug for Conn<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("id", &self.shared.id)
            .field("closed", &self.shared.is_closed())
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

impl<S> Conn<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap `raw`. Allocates the queues; no task is spawned until [`Conn::start`].
    pub fn wrap(raw: S, factory: Arc<MessageFactory>, config: ConnectionConfig) -> Self {
        // mpsc panics on a zero capacity; validation reports it, this keeps wrap total
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));

        Self {
            shared: Arc::new(Shared {
                id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
                closed: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                outbound_tx,
                inbound_tx: Mutex::new(Some(inbound_tx)),
                stats: ConnStats::default(),
            }),
            stream: Mutex::new(Some(raw)),
            outbound_rx: Mutex::new(Some(outbound_rx)),
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            factory,
            config,
            local_addr: None,
            peer_addr: None,
        }
    }

    /// Wrap `raw` with the process-wide factory and the given heartbeat interval.
    /// A zero interval disables heartbeats.
    pub fn with_heartbeat(raw: S, heartbeat_interval: Duration) -> Self {
        Self::wrap(
            raw,
            MessageFactory::global(),
            ConnectionConfig::with_heartbeat(heartbeat_interval),
        )
    }

    /// Launch the send, receive and heartbeat loops.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        self.start_with_cancel(CancellationToken::new())
    }

    /// Like [`Conn::start`], additionally closing the connection when `ctx` is
    /// cancelled.
    #[instrument(skip(self, ctx), fields(conn = self.shared.id))]
    pub fn start_with_cancel(&self, ctx: CancellationToken) -> Result<()> {
        if self.shared.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }

        let stream = self
            .stream
            .lock()
            .map_err(|_| ProtocolError::Custom("Connection stream lock poisoned".into()))?
            .take()
            .ok_or(ProtocolError::AlreadyStarted)?;
        let outbound = self
            .outbound_rx
            .lock()
            .map_err(|_| ProtocolError::Custom("Outbound queue lock poisoned".into()))?
            .take()
            .ok_or(ProtocolError::AlreadyStarted)?;
        let inbound = self
            .shared
            .inbound_tx
            .lock()
            .map_err(|_| ProtocolError::Custom("Inbound queue lock poisoned".into()))?
            .clone()
            .ok_or(ProtocolError::ConnectionClosed)?;

        let (reader, writer) = tokio::io::split(stream);
        let frames_in = FramedRead::new(reader, FrameCodec);
        let frames_out = FramedWrite::new(writer, FrameCodec);

        let idle_timeout = self.config.effective_idle_timeout();
        let heartbeat = self
            .config
            .heartbeat_enabled()
            .then_some(self.config.heartbeat_interval);

        let shared = self.shared.clone();
        let factory = self.factory.clone();
        let span = info_span!("conn", id = shared.id);

        global_metrics().connection_started();
        info!(
            idle_timeout_ms = idle_timeout.as_millis() as u64,
            heartbeat_ms = heartbeat.map(|d| d.as_millis() as u64),
            "Connection started"
        );

        tokio::spawn(
            supervise(
                shared,
                ctx,
                frames_in,
                frames_out,
                outbound,
                inbound,
                factory,
                idle_timeout,
                heartbeat,
            )
            .instrument(span),
        );

        Ok(())
    }
}

impl Conn<TcpStream> {
    /// Wrap a TCP stream, keeping its socket addresses for [`Conn::local_addr`] and
    /// [`Conn::peer_addr`].
    pub fn wrap_tcp(
        stream: TcpStream,
        factory: Arc<MessageFactory>,
        config: ConnectionConfig,
    ) -> Self {
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let mut conn = Self::wrap(stream, factory, config);
        conn.local_addr = local_addr;
        conn.peer_addr = peer_addr;
        conn
    }
}

impl<S> Conn<S> {
    /// Queue `msg` for sending.
    ///
    /// Waits while the outbound queue is full. Fails with
    /// [`ProtocolError::ConnectionClosed`] if the connection is closed, including
    /// while waiting. Success means the message was queued, not that it was written.
    pub async fn send_message<M: Message>(&self, msg: M) -> Result<()> {
        self.shared.send(Box::new(msg)).await
    }

    /// [`Conn::send_message`] for an already boxed message.
    pub async fn send_boxed(&self, msg: Box<dyn Message>) -> Result<()> {
        self.shared.send(msg).await
    }

    /// Next inbound message.
    ///
    /// Returns `None` once the connection has closed and every message received
    /// before that has been handed out. This is the only receive-side failure signal.
    pub async fn recv(&self) -> Option<Box<dyn Message>> {
        self.inbound_rx.lock().await.recv().await
    }

    /// Close the connection. Idempotent; every call after the first is a no-op.
    ///
    /// Stops the loops, ends the inbound channel and releases the stream. The
    /// outbound queue is left alone; queued messages are simply never written.
    pub fn close(&self) -> Result<()> {
        if self.shared.shutdown(None) {
            // never started: the stream is still parked here
            if let Ok(mut stream) = self.stream.lock() {
                stream.take();
            }
        }
        Ok(())
    }

    /// Resolves once the connection is closed, by [`Conn::close`] or by a loop.
    pub async fn closed(&self) {
        self.shared.cancel.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Process-unique id used in log spans.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Local socket address, when the stream is a socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Remote socket address, when the stream is a socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Silence tolerated before the peer is considered dead.
    pub fn idle_timeout(&self) -> Duration {
        self.config.effective_idle_timeout()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn factory(&self) -> &Arc<MessageFactory> {
        &self.factory
    }

    pub fn stats(&self) -> ConnStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<S> Drop for Conn<S> {
    fn drop(&mut self) {
        self.shared.shutdown(None);
    }
}

/// Run the loops to completion. Every loop is joined here, and a panic in any of
/// them closes the connection like any other fatal error.
#[allow(clippy::too_many_arguments)]
async fn supervise<S>(
    shared: Arc<Shared>,
    ctx: CancellationToken,
    frames_in: FramedRead<ReadHalf<S>, FrameCodec>,
    frames_out: FramedWrite<WriteHalf<S>, FrameCodec>,
    outbound: Outbound,
    inbound: Inbound,
    factory: Arc<MessageFactory>,
    idle_timeout: Duration,
    heartbeat: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let watch = {
        let shared = shared.clone();
        async move {
            tokio::select! {
                _ = ctx.cancelled() => {
                    shared.shutdown(None);
                }
                _ = shared.cancel.cancelled() => {}
            }
        }
    };

    let sender = guarded(
        shared.clone(),
        "send loop",
        send_loop(shared.clone(), frames_out, outbound),
    );
    let receiver = guarded(
        shared.clone(),
        "receive loop",
        receive_loop(shared.clone(), frames_in, factory, inbound, idle_timeout),
    );
    let beater = guarded(shared.clone(), "heartbeat loop", {
        let shared = shared.clone();
        async move {
            if let Some(period) = heartbeat {
                heartbeat_loop(shared, period).await;
            }
        }
    });

    tokio::join!(watch, sender, receiver, beater);

    // the stream halves were dropped with the loops above
    shared.shutdown(None);
    global_metrics().connection_closed();
    debug!(stats = ?shared.stats.snapshot(), "Connection loops finished");
}

async fn guarded<F>(shared: Arc<Shared>, context: &'static str, fut: F)
where
    F: std::future::Future<Output = ()>,
{
    if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
        let err = ProtocolError::Panicked {
            context,
            message: panic_message(payload.as_ref()),
        };
        shared.shutdown(Some(&err));
    }
}

async fn send_loop<S>(
    shared: Arc<Shared>,
    mut frames: FramedWrite<WriteHalf<S>, FrameCodec>,
    mut outbound: Outbound,
) where
    S: AsyncWrite,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            msg = outbound.recv() => msg,
        };

        let Some(msg) = msg else {
            shared.shutdown(None);
            return;
        };

        let frame = match Frame::from_message(&*msg) {
            Ok(frame) => frame,
            Err(e) => {
                global_metrics().encode_error();
                shared.shutdown(Some(&e));
                return;
            }
        };
        let size = frame.wire_size();
        let message_type = frame.message_type();

        let written = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            res = frames.send(frame) => res,
        };

        if let Err(e) = written {
            global_metrics().io_error();
            shared.shutdown(Some(&e));
            return;
        }

        trace!(%message_type, bytes = size, "Frame written");
        shared.stats.record_sent(size as u64);
    }
}

async fn receive_loop<S>(
    shared: Arc<Shared>,
    mut frames: FramedRead<ReadHalf<S>, FrameCodec>,
    factory: Arc<MessageFactory>,
    inbound: Inbound,
    idle_timeout: Duration,
) where
    S: AsyncRead,
{
    let mut deadline = Instant::now() + idle_timeout;

    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => {
                global_metrics().idle_timeout();
                shared.shutdown(Some(&ProtocolError::ConnectionTimeout));
                return;
            }
            next = frames.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                match e {
                    ProtocolError::Io(_) => global_metrics().io_error(),
                    _ => global_metrics().decode_error(),
                }
                shared.shutdown(Some(&e));
                return;
            }
            None => {
                debug!("Peer closed the stream");
                shared.shutdown(None);
                return;
            }
        };

        let size = frame.wire_size();
        let msg = match factory.generate(frame.message_type(), frame.payload()) {
            Ok(msg) => msg,
            Err(e) => {
                global_metrics().decode_error();
                shared.shutdown(Some(&e));
                return;
            }
        };
        trace!(message_type = %frame.message_type(), bytes = size, "Frame received");
        shared.stats.record_received(size as u64);

        let delivered = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            res = inbound.send(msg) => res,
        };
        if delivered.is_err() {
            // the receiving half is gone, so is the Conn
            shared.shutdown(None);
            return;
        }

        deadline = Instant::now() + idle_timeout;
    }
}

async fn heartbeat_loop(shared: Arc<Shared>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut serial: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        serial = serial.wrapping_add(1);
        // best effort: the only failure is a closed connection, which ends the loop
        if shared.send(Box::new(Heartbeat::new(serial))).await.is_err() {
            return;
        }
        global_metrics().heartbeat_sent();
        trace!(serial, "Heartbeat queued");
    }
}
