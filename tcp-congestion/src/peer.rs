//! Bundled acknowledging peer.
//!
//! A minimal receiver for the line protocol in [`crate::packet`]: it reads
//! the round-count handshake, then for each batch replies with one `ACK<n>`
//! line per packet, shaped by a [`FaultModel`]. It exists so the sender can
//! be exercised over a real TCP connection without an external program.

use std::io::ErrorKind;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::{sleep_until, Instant};

use crate::config::FaultConfig;
use crate::packet::{Batch, PacketError, Reply};
use crate::simulator::FaultModel;
use crate::transport::TransportError;

/// What one peer session saw and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerStats {
    pub rounds_announced: u32,
    pub batches: u32,
    pub packets: u64,
    pub acks_sent: u64,
    pub ends_sent: u64,
}

#[derive(Debug)]
pub struct Peer {
    listener: TcpListener,
    faults: FaultConfig,
}

impl Peer {
    pub async fn bind(addr: impl ToSocketAddrs, faults: FaultConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, faults })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve exactly one sender, then return.
    pub async fn accept_one(&self) -> Result<PeerStats, TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        log::info!("[peer] sender connected from {addr}");
        serve_connection(stream, FaultModel::new(self.faults.clone())).await
    }

    /// Serve senders until the process is stopped, one task per connection.
    pub async fn run(self) -> Result<(), TransportError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            log::info!("[peer] sender connected from {addr}");
            let model = FaultModel::new(self.faults.clone());
            tokio::spawn(async move {
                match serve_connection(stream, model).await {
                    Ok(stats) => log::info!("[peer] {addr} done: {stats:?}"),
                    Err(e) => log::warn!("[peer] {addr} failed: {e}"),
                }
            });
        }
    }
}

/// Run the receiver side of one connection until the sender hangs up.
///
/// A sender that disappears, whether by closing or by resetting the
/// connection on either the read or the write path, ends the session with
/// `Ok`. Only the handshake line is mandatory.
pub async fn serve_connection(
    stream: TcpStream,
    mut model: FaultModel,
) -> Result<PeerStats, TransportError> {
    stream.set_nodelay(true)?;
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut stats = PeerStats::default();

    let Some(first) = read_line(&mut lines).await? else {
        return Err(TransportError::Closed);
    };
    let first = first.trim();
    stats.rounds_announced = first
        .parse()
        .map_err(|_| PacketError::BadRound(first.to_string()))?;
    log::debug!("[peer] sender announced {} round(s)", stats.rounds_announced);

    while let Some(round_line) = read_line(&mut lines).await? {
        let Some(ids_line) = read_line(&mut lines).await? else {
            log::debug!("[peer] sender went away mid-batch");
            return Ok(stats);
        };
        let batch = Batch::decode(&round_line, &ids_line)?;
        stats.batches += 1;
        stats.packets += batch.ids.len() as u64;

        let plan = model.plan(&batch.ids);
        log::debug!(
            "[peer] ← round={} packets={} replying={}",
            batch.round,
            batch.ids.len(),
            plan.len()
        );

        let start = Instant::now();
        for planned in plan {
            sleep_until(start + planned.after).await;
            let line = planned.reply.encode();
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => {}
                Err(e) if sender_gone(&e) => {
                    log::debug!("[peer] sender went away mid-batch");
                    return Ok(stats);
                }
                Err(e) => return Err(e.into()),
            }
            match planned.reply {
                Reply::Ack(_) => stats.acks_sent += 1,
                Reply::End => stats.ends_sent += 1,
            }
        }
    }

    log::debug!("[peer] sender closed the connection");
    Ok(stats)
}

/// Next line from the sender, or `None` once it has closed or reset.
async fn read_line(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
) -> Result<Option<String>, TransportError> {
    match lines.next_line().await {
        Ok(line) => Ok(line),
        Err(e) if sender_gone(&e) => {
            log::debug!("[peer] sender reset the connection");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn sender_gone(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}
