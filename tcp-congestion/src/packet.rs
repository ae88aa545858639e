//! Line-oriented wire format exchanged with the peer.
//!
//! The sender never transmits payload bytes; a round is described entirely by
//! the identifiers of the packets it contains. Every message is one line of
//! UTF-8 text terminated by `\n` (a trailing `\r` is tolerated on input).
//!
//! # Wire format
//!
//! ```text
//!  sender → peer   (once)        <total rounds>\n
//!  sender → peer   (per round)   <round number>\n
//!                                pkt<seq>,pkt<seq>,...\n
//!  peer → sender   (per packet)  ACK<seq>\n     normal acknowledgement
//!                                END\n          termination token
//! ```
//!
//! No I/O happens here; this is pure data transformation.

use std::fmt;

use thiserror::Error;

/// Reply line that terminates the current round's acknowledgement stream.
pub const END_TOKEN: &str = "END";

/// Prefix of every packet identifier on the wire.
const ID_PREFIX: &str = "pkt";

/// Prefix the bundled peer uses for acknowledgement tokens.
const ACK_PREFIX: &str = "ACK";

// ---------------------------------------------------------------------------
// PacketId
// ---------------------------------------------------------------------------

/// Identifier of one simulated segment. Sequence numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketId(u64);

impl PacketId {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn seq(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ID_PREFIX}{}", self.0)
    }
}

impl std::str::FromStr for PacketId {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        s.strip_prefix(ID_PREFIX)
            .and_then(|n| n.parse::<u64>().ok())
            .map(PacketId)
            .ok_or_else(|| PacketError::BadPacketId(s.to_string()))
    }
}

/// Render a batch as the comma-joined list used on the wire and in reports.
pub fn join_ids(ids: &[PacketId]) -> String {
    ids.iter()
        .map(PacketId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One round's worth of transmitted packet identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub round: u32,
    pub ids: Vec<PacketId>,
}

impl Batch {
    /// Serialise into the two-line wire representation, newline-terminated.
    pub fn encode(&self) -> String {
        format!("{}\n{}\n", self.round, join_ids(&self.ids))
    }

    /// Parse a batch from its round line and its packet-list line.
    ///
    /// An empty packet-list line decodes to an empty batch.
    pub fn decode(round_line: &str, ids_line: &str) -> Result<Self, PacketError> {
        let round_line = round_line.trim();
        if round_line.is_empty() {
            return Err(PacketError::MissingRound);
        }
        let round = round_line
            .parse::<u32>()
            .map_err(|_| PacketError::BadRound(round_line.to_string()))?;

        let ids_line = ids_line.trim();
        let ids = if ids_line.is_empty() {
            Vec::new()
        } else {
            ids_line
                .split(',')
                .map(str::parse)
                .collect::<Result<Vec<PacketId>, _>>()?
        };
        Ok(Self { round, ids })
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A line received from the peer while awaiting acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Normal acknowledgement; the token text is opaque to the sender.
    Ack(String),
    /// The distinguished termination token.
    End,
}

impl Reply {
    /// Classify one received line. Only the exact token `END` terminates.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == END_TOKEN {
            Reply::End
        } else {
            Reply::Ack(line.to_string())
        }
    }

    /// The acknowledgement the bundled peer emits for `id`.
    pub fn ack_for(id: PacketId) -> Self {
        Reply::Ack(format!("{ACK_PREFIX}{}", id.seq()))
    }

    /// Wire form, newline-terminated.
    pub fn encode(&self) -> String {
        match self {
            Reply::Ack(token) => format!("{token}\n"),
            Reply::End => format!("{END_TOKEN}\n"),
        }
    }
}

/// Errors that can arise when parsing a line from the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("expected a round number, got an empty line")]
    MissingRound,
    #[error("malformed round number {0:?}")]
    BadRound(String),
    #[error("malformed packet identifier {0:?}")]
    BadPacketId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(seqs: &[u64]) -> Vec<PacketId> {
        seqs.iter().copied().map(PacketId::new).collect()
    }

    #[test]
    fn packet_id_display_matches_wire() {
        assert_eq!(PacketId::new(7).to_string(), "pkt7");
        assert_eq!("pkt12".parse::<PacketId>().unwrap(), PacketId::new(12));
    }

    #[test]
    fn packet_id_rejects_garbage() {
        assert_eq!(
            "packet3".parse::<PacketId>(),
            Err(PacketError::BadPacketId("packet3".into()))
        );
        assert!("pkt".parse::<PacketId>().is_err());
        assert!("pkt-1".parse::<PacketId>().is_err());
    }

    #[test]
    fn batch_encodes_as_two_lines() {
        let batch = Batch {
            round: 3,
            ids: ids(&[1, 2]),
        };
        assert_eq!(batch.encode(), "3\npkt1,pkt2\n");
    }

    #[test]
    fn batch_decode_tolerates_crlf() {
        let batch = Batch::decode("4\r\n", "pkt5,pkt6,pkt7\r\n").unwrap();
        assert_eq!(batch.round, 4);
        assert_eq!(batch.ids, ids(&[5, 6, 7]));
    }

    #[test]
    fn batch_decode_errors() {
        assert_eq!(Batch::decode("", "pkt1"), Err(PacketError::MissingRound));
        assert_eq!(
            Batch::decode("x", "pkt1"),
            Err(PacketError::BadRound("x".into()))
        );
        assert_eq!(
            Batch::decode("1", "pkt1,,pkt2"),
            Err(PacketError::BadPacketId("".into()))
        );
    }

    #[test]
    fn empty_id_line_is_empty_batch() {
        let batch = Batch::decode("1", "").unwrap();
        assert!(batch.ids.is_empty());
    }

    #[test]
    fn only_exact_end_terminates() {
        assert_eq!(Reply::parse("END\n"), Reply::End);
        assert_eq!(Reply::parse("END\r\n"), Reply::End);
        assert_eq!(Reply::parse("end"), Reply::Ack("end".into()));
        assert_eq!(Reply::parse("ENDED"), Reply::Ack("ENDED".into()));
    }

    #[test]
    fn ack_for_uses_sequence_number() {
        assert_eq!(Reply::ack_for(PacketId::new(9)).encode(), "ACK9\n");
        assert_eq!(Reply::End.encode(), "END\n");
    }
}
