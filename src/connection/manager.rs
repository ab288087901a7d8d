//! Connection manager with a persistent control channel and automatic reconnection

use crate::transport::{TransportConnector, TransportStream};
use anyhow::{anyhow, bail, Context, Result};
use camera_agent_shared::{
    codec::{self, CodecError, FrameDecoder},
    Envelope, Header, Payload,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

const OUTBOUND_CAPACITY: usize = 100;
const EVENT_CAPACITY: usize = 100;

/// Events emitted by the connection manager
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Successfully connected to the hub
    Connected { remote: String },
    /// An established connection dropped
    Disconnected { reason: String },
    /// A connection attempt failed
    ConnectionFailed { reason: String },
    /// Received an envelope from the hub
    Received(Envelope),
}

/// Configuration for connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub device_id: String,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            device_id: "camera-001".into(),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Work items for the single writer
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(Envelope),
    /// Flush, close the socket, then acknowledge
    Close(oneshot::Sender<()>),
}

/// Stamps outgoing payloads with the device id and a process-wide sequence id
#[derive(Debug, Clone)]
struct Stamp {
    device_id: Arc<str>,
    sequence_id: Arc<AtomicU64>,
}

impl Stamp {
    fn envelope(&self, payload: Payload) -> Envelope {
        let seq = self.sequence_id.fetch_add(1, Ordering::SeqCst) + 1;
        Envelope {
            header: Header::new(&*self.device_id, seq),
            payload,
        }
    }
}

/// Cloneable handle for writing to the control channel.
///
/// All clones feed one queue drained by one writer, so concurrent callers
/// never interleave bytes on the wire. No ordering is promised between
/// callers.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    stamp: Stamp,
    tx: mpsc::Sender<Outbound>,
}

impl OutboundSender {
    pub(crate) fn channel(device_id: &str, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        let stamp = Stamp {
            device_id: Arc::from(device_id),
            sequence_id: Arc::new(AtomicU64::new(0)),
        };
        (Self { stamp, tx }, rx)
    }

    /// Queue a payload, waiting for room in the queue
    pub async fn send(&self, payload: Payload) -> Result<()> {
        self.tx
            .send(Outbound::Frame(self.stamp.envelope(payload)))
            .await
            .map_err(|_| anyhow!("Connection closed"))
    }

    /// Queue a payload without waiting; fails when the queue is full or closed
    pub fn try_send(&self, payload: Payload) -> Result<()> {
        self.tx
            .try_send(Outbound::Frame(self.stamp.envelope(payload)))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => anyhow!("Outbound queue full"),
                mpsc::error::TrySendError::Closed(_) => anyhow!("Connection closed"),
            })
    }
}

/// Manages the persistent connection to the hub
pub struct ConnectionManager {
    sender: OutboundSender,
    event_rx: mpsc::Receiver<ConnectionEvent>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop
    pub fn new<C: TransportConnector>(config: ConnectionConfig, connector: C) -> Self {
        let (sender, outbound_rx) = OutboundSender::channel(&config.device_id, OUTBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(EVENT_CAPACITY);

        let stamp = sender.stamp.clone();
        let task = tokio::spawn(async move {
            connection_loop(config, connector, stamp, outbound_rx, event_tx).await;
        });

        Self {
            sender,
            event_rx,
            task,
        }
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }

    /// Get a clone of the sender for outbound messages
    pub fn sender(&self) -> OutboundSender {
        self.sender.clone()
    }

    /// Flush queued frames and close the channel, giving up after `grace`
    pub async fn disconnect(self, grace: Duration) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let tx = self.sender.tx.clone();

        let closed = timeout(grace, async move {
            tx.send(Outbound::Close(ack_tx)).await.ok()?;
            ack_rx.await.ok()
        })
        .await;

        match closed {
            Ok(Some(())) => info!("Disconnected from hub"),
            _ => warn!("Channel did not close within {:?}, dropping it", grace),
        }
        self.task.abort();
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop<C: TransportConnector>(
    config: ConnectionConfig,
    connector: C,
    stamp: Stamp,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    event_tx: mpsc::Sender<ConnectionEvent>,
) {
    let mut reconnect_delay = config.reconnect_delay;
    let remote = connector.describe();

    loop {
        match timeout(config.connect_timeout, connector.connect()).await {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay;

                let _ = event_tx
                    .send(ConnectionEvent::Connected {
                        remote: remote.clone(),
                    })
                    .await;

                match handle_connection(stream, &stamp, &mut outbound_rx, &event_tx).await {
                    Ok(()) => {
                        debug!("Connection loop finished");
                        return;
                    }
                    Err(reason) => {
                        let _ = event_tx
                            .send(ConnectionEvent::Disconnected {
                                reason: format!("{:#}", reason),
                            })
                            .await;
                    }
                }
            }
            Ok(Err(e)) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: format!("{:#}", e),
                    })
                    .await;
            }
            Err(_) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: format!("connect to {} timed out after {:?}", remote, config.connect_timeout),
                    })
                    .await;
            }
        }

        if event_tx.is_closed() {
            return;
        }

        tokio::time::sleep(reconnect_delay).await;

        // Exponential backoff
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }
}

/// Handle an active connection.
///
/// Returns `Ok(())` when closed locally and `Err` when the link dropped.
async fn handle_connection<S: TransportStream>(
    stream: S,
    stamp: &Stamp,
    outbound_rx: &mut mpsc::Receiver<Outbound>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
) -> Result<()> {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let hello = stamp.envelope(Payload::Hello {
        agent_version: env!("CARGO_PKG_VERSION").into(),
    });
    writer
        .write_all(&codec::encode(&hello)?)
        .await
        .context("send hello")?;

    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Frame(envelope)) => match codec::encode(&envelope) {
                    Ok(encoded) => writer.write_all(&encoded).await.context("write error")?,
                    Err(e) => error!("Dropping unencodable frame seq={}: {}", envelope.header.sequence_id, e),
                },
                Some(Outbound::Close(ack)) => {
                    writer.flush().await.ok();
                    writer.shutdown().await.ok();
                    let _ = ack.send(());
                    return Ok(());
                }
                None => {
                    writer.shutdown().await.ok();
                    return Ok(());
                }
            },

            result = reader.read(&mut read_buf) => {
                let n = result.context("read error")?;
                if n == 0 {
                    bail!("Hub closed connection");
                }
                decoder.extend(&read_buf[..n]);

                loop {
                    match decoder.decode_next() {
                        Ok(Some(envelope)) => {
                            if event_tx.send(ConnectionEvent::Received(envelope)).await.is_err() {
                                return Ok(());
                            }
                        }
                        Ok(None) => break,
                        // The frame was consumed; only its body was bad
                        Err(CodecError::Json(e)) => warn!("Skipping undecodable frame: {}", e),
                        Err(e) => bail!("Protocol error: {}", e),
                    }
                }
            }
        }
    }
}
