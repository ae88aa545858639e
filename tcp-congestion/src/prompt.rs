//! Interactive operator input.
//!
//! Two prompts, in order: the TCP mode and the number of rounds. Either may
//! be pre-supplied (from command-line flags), in which case its prompt is
//! skipped. The reader and writer are generic so tests can drive the
//! prompts from byte slices.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::mode::Mode;

pub const MODE_PROMPT: &str = "Select TCP mode (TAHOE or RENO): ";
pub const ROUNDS_PROMPT: &str = "Enter number of rounds: ";

/// Values the operator may have supplied up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presets {
    pub mode: Option<String>,
    pub rounds: Option<i64>,
}

/// Prompt for whatever `presets` leaves open and validate the result.
pub async fn read_operator_input<R, W>(
    reader: &mut R,
    writer: &mut W,
    presets: Presets,
) -> Result<SimConfig, SimError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mode: Mode = match presets.mode {
        Some(text) => text.parse()?,
        None => ask(reader, writer, MODE_PROMPT).await?.parse()?,
    };

    let rounds = match presets.rounds {
        Some(n) => n,
        None => {
            let answer = ask(reader, writer, ROUNDS_PROMPT).await?;
            answer.trim().parse::<i64>().map_err(|_| {
                SimError::InvalidConfig(format!("round count {answer:?} is not an integer"))
            })?
        }
    };

    SimConfig::new(mode, rounds)
}

/// Print `prompt` and read one non-empty line.
async fn ask<R, W>(reader: &mut R, writer: &mut W, prompt: &str) -> Result<String, SimError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(prompt.as_bytes())
        .await
        .map_err(SimError::Input)?;
    writer.flush().await.map_err(SimError::Input)?;

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await.map_err(SimError::Input)?;
        if n == 0 {
            return Err(SimError::InvalidConfig(format!(
                "input ended before answering {:?}",
                prompt.trim_end()
            )));
        }
        if !line.trim().is_empty() {
            return Ok(line.trim().to_string());
        }
    }
}
