//! Example: TCP Echo With Heartbeats
//!
//! Starts an echo server on a loopback port, connects a client with heartbeats
//! enabled, sends a few strings and prints what comes back. A custom message kind is
//! registered alongside the built-ins to show the factory in use.
//!
//! Run with: `cargo run --example echo`
//! Set `DUPLEX_WIRE_HEARTBEAT_INTERVAL_MS` to change the heartbeat interval.

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;
use std::time::Duration;

use duplex_wire::config::NetworkConfig;
use duplex_wire::error::{ProtocolError, Result};
use duplex_wire::protocol::{Heartbeat, Message, MessageFactory, MessageType, SingleString};
use duplex_wire::transport::tcp;
use duplex_wire::utils::logging::{app_span, init_logging};
use duplex_wire::utils::metrics::global_metrics;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::Instrument;

const POINT: MessageType = MessageType(0x0100);

/// Two signed 32-bit coordinates, 8 bytes big-endian.
#[derive(Debug, Default)]
struct Point {
    x: i32,
    y: i32,
}

impl Message for Point {
    fn message_type(&self) -> MessageType {
        POINT
    }

    fn pack(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&self.x.to_be_bytes());
        out.extend_from_slice(&self.y.to_be_bytes());
        Ok(out)
    }

    fn unpack(&mut self, payload: &[u8]) -> Result<()> {
        let raw: [u8; 8] = payload
            .try_into()
            .map_err(|_| ProtocolError::MalformedPayload("Point needs 8 bytes".into()))?;
        self.x = i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        self.y = i32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = NetworkConfig::from_env()?;
    if !config.connection.heartbeat_enabled() {
        config.connection.heartbeat_interval = Duration::from_millis(500);
    }
    config.validate_strict()?;
    init_logging(&config.logging);

    let span = app_span(&config.logging);
    run(config).instrument(span).await
}

async fn run(config: NetworkConfig) -> Result<()> {
    let factory = MessageFactory::global();
    factory.register(POINT, |_, payload| {
        let mut point = Point::default();
        point.unpack(payload)?;
        Ok(Box::new(point) as Box<dyn Message>)
    })?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let server = tokio::spawn(tcp::start_server_with_shutdown(
        listener,
        config.clone(),
        factory.clone(),
        shutdown_rx,
        |conn| async move {
            while let Some(msg) = conn.recv().await {
                // heartbeats are the peer's liveness signal, not payload to echo
                if msg.is::<Heartbeat>() {
                    continue;
                }
                if conn.send_boxed(msg).await.is_err() {
                    break;
                }
            }
        },
    ));

    let client = Arc::new(tcp::connect(&addr, factory, &config).await?);
    println!("Connected to {}", addr);

    client.send_message(SingleString::new("hello")).await?;
    client.send_message(Point { x: 3, y: -7 }).await?;
    client.send_message(SingleString::new("goodbye")).await?;

    let mut echoed = 0;
    while echoed < 3 {
        let Some(msg) = client.recv().await else {
            println!("Connection closed early");
            break;
        };
        if let Some(text) = msg.downcast_ref::<SingleString>() {
            println!("echo: {:?}", text.message());
        } else if let Some(point) = msg.downcast_ref::<Point>() {
            println!("echo: Point({}, {})", point.x, point.y);
        } else if let Some(hb) = msg.downcast_ref::<Heartbeat>() {
            println!("server heartbeat #{}", hb.serial_number());
            continue;
        }
        echoed += 1;
    }

    // idle for a few heartbeat intervals to show the link staying up
    tokio::time::sleep(config.connection.heartbeat_interval * 3).await;
    println!("still open after idling: {}", !client.is_closed());

    client.close()?;
    let _ = shutdown_tx.send(()).await;
    if let Ok(result) = server.await {
        result?;
    }

    global_metrics().log_metrics();
    println!("stats: {:?}", client.stats());
    Ok(())
}
