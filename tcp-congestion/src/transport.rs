//! The sender's view of the network.
//!
//! [`Transport`] is the narrow seam between the congestion controller and
//! whatever carries its packets: a real TCP connection ([`TcpTransport`]),
//! the in-process fault-injecting link ([`crate::simulator::SimulatedLink`]),
//! or a deterministic script in tests. All protocol logic lives in the
//! controller; implementations own only line I/O.
//!
//! Waiting for an acknowledgement is deadline-aware: implementations block
//! on a native timer (`tokio::time::timeout`) instead of polling, so a
//! timeout fires no earlier than the deadline and no later than one tick of
//! the tokio timer wheel (1 ms) after it.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::packet::{Batch, PacketError, PacketId, Reply};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from transport operations. Never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O error from the OS.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer closed the connection.
    #[error("peer closed the connection")]
    Closed,
    /// A line from the peer could not be decoded.
    #[error("malformed message: {0}")]
    Packet(#[from] PacketError),
}

// ---------------------------------------------------------------------------
// AckEvent
// ---------------------------------------------------------------------------

/// Outcome of one bounded wait for an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckEvent {
    /// A normal acknowledgement arrived; the token text is opaque.
    Ack(String),
    /// The termination token arrived.
    End,
    /// Nothing arrived before the deadline.
    Timeout,
}

impl From<Reply> for AckEvent {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Ack(token) => AckEvent::Ack(token),
            Reply::End => AckEvent::End,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Capability the controller uses to exchange packets with its peer.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Forward the total round count to the peer, once, before round 1.
    async fn handshake(&mut self, total_rounds: u32) -> Result<(), TransportError>;

    /// Transmit one round's batch of packet identifiers.
    async fn send(&mut self, round: u32, ids: &[PacketId]) -> Result<(), TransportError>;

    /// Wait up to `deadline` for the next acknowledgement.
    ///
    /// Running out of time is [`AckEvent::Timeout`], not an error.
    async fn await_ack(&mut self, deadline: Duration) -> Result<AckEvent, TransportError>;

    /// Release the connection after the last round.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Receiving half of an operator-abort signal.
///
/// The controller races every acknowledgement wait against
/// [`Shutdown::triggered`]. Dropping the [`ShutdownTrigger`] without firing
/// it leaves the signal permanently un-triggered.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending half of the abort signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the trigger has fired.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Trigger dropped without firing: never resolve.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl ShutdownTrigger {
    pub fn fire(&self) {
        // send_replace never fails, even with no receivers left.
        self.tx.send_replace(true);
    }
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// Line-oriented transport over a TCP connection to the peer.
#[derive(Debug)]
pub struct TcpTransport {
    /// Remote peer address.
    pub peer: SocketAddr,
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl TcpTransport {
    /// Open a connection to `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            peer,
            reader: BufReader::new(read_half).lines(),
            writer: BufWriter::new(write_half),
        })
    }

    async fn write_flush(&mut self, text: &str) -> Result<(), TransportError> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl Transport for TcpTransport {
    async fn handshake(&mut self, total_rounds: u32) -> Result<(), TransportError> {
        log::debug!("[tcp] → rounds={total_rounds} to {}", self.peer);
        self.write_flush(&format!("{total_rounds}\n")).await
    }

    async fn send(&mut self, round: u32, ids: &[PacketId]) -> Result<(), TransportError> {
        let batch = Batch {
            round,
            ids: ids.to_vec(),
        };
        log::debug!("[tcp] → round={round} packets={}", ids.len());
        self.write_flush(&batch.encode()).await
    }

    async fn await_ack(&mut self, deadline: Duration) -> Result<AckEvent, TransportError> {
        // Lines::next_line is cancel safe, so a timed-out wait loses no data.
        match timeout(deadline, self.reader.next_line()).await {
            Err(_elapsed) => Ok(AckEvent::Timeout),
            Ok(Ok(Some(line))) => Ok(Reply::parse(&line).into()),
            Ok(Ok(None)) => Err(TransportError::Closed),
            Ok(Err(e)) => Err(TransportError::Io(e)),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        log::debug!("[tcp] closed connection to {}", self.peer);
        Ok(())
    }
}
