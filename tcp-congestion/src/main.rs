//! Entry point for `tcp-congestion`.
//!
//! Parses CLI arguments and dispatches into **client**, **server** or
//! **simulate** mode. All protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, signal handling, argument
//! parsing, operator prompts).

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;

use tcp_congestion::peer::Peer;
use tcp_congestion::prompt::{read_operator_input, Presets};
use tcp_congestion::report::{ConsoleObserver, LogObserver, Tee};
use tcp_congestion::simulator::SimulatedLink;
use tcp_congestion::transport::{Shutdown, TcpTransport};
use tcp_congestion::{
    CongestionController, FaultConfig, SimConfig, Simulation, SimulationSummary, Transport,
};

/// Round-based TCP Tahoe/Reno congestion-control simulator.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sender against a remote peer.
    Client {
        /// Peer address (e.g. 127.0.0.1:1992).
        #[arg(short, long, default_value = "127.0.0.1:1992")]
        peer: String,
        #[command(flatten)]
        operator: OperatorArgs,
    },
    /// Run the bundled acknowledging peer.
    Server {
        /// Local address to bind (e.g. 0.0.0.0:1992).
        #[arg(short, long, default_value = "0.0.0.0:1992")]
        bind: String,
        #[command(flatten)]
        faults: FaultArgs,
    },
    /// Run sender and peer in-process over a simulated link.
    Simulate {
        #[command(flatten)]
        operator: OperatorArgs,
        #[command(flatten)]
        faults: FaultArgs,
    },
}

/// Answers to the operator prompts; any left out are asked for.
#[derive(Args)]
struct OperatorArgs {
    /// TCP mode: TAHOE or RENO (case-insensitive).
    #[arg(short, long)]
    mode: Option<String>,
    /// Number of rounds to run.
    #[arg(short, long, allow_negative_numbers = true)]
    rounds: Option<i64>,
}

#[derive(Args)]
struct FaultArgs {
    /// Probability in [0, 1] that a packet is lost.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Minimum acknowledgement delay in milliseconds.
    #[arg(long, default_value_t = 20)]
    min_delay_ms: u64,
    /// Maximum acknowledgement delay in milliseconds.
    #[arg(long, default_value_t = 80)]
    max_delay_ms: u64,
    /// RNG seed for a reproducible fault sequence.
    #[arg(long)]
    seed: Option<u64>,
    /// Packets in the simulated transfer; later packets are answered with END.
    #[arg(long)]
    transfer_size: Option<u64>,
}

impl FaultArgs {
    fn into_config(self) -> Result<FaultConfig> {
        let config = FaultConfig {
            loss_rate: self.loss,
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            seed: self.seed,
            transfer_size: self.transfer_size,
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Client { peer, operator } => {
            let config = operator_config(operator).await?;
            let transport = TcpTransport::connect(peer.as_str())
                .await
                .with_context(|| format!("connecting to {peer}"))?;
            log::info!("Connected to peer {}", transport.peer);
            let summary = simulate(config, transport).await?;
            print_summary(&summary);
            println!("\nClient disconnected.");
        }
        Command::Server { bind, faults } => {
            let peer = Peer::bind(bind.as_str(), faults.into_config()?)
                .await
                .with_context(|| format!("binding {bind}"))?;
            log::info!("Peer listening on {}", peer.local_addr()?);
            peer.run().await?;
        }
        Command::Simulate { operator, faults } => {
            let config = operator_config(operator).await?;
            let link = SimulatedLink::new(faults.into_config()?);
            let summary = simulate(config, link).await?;
            print_summary(&summary);
        }
    }
    Ok(())
}

/// Fill in whatever the flags left open from the interactive prompts.
async fn operator_config(args: OperatorArgs) -> Result<SimConfig> {
    let presets = Presets {
        mode: args.mode,
        rounds: args.rounds,
    };
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    Ok(read_operator_input(&mut stdin, &mut stdout, presets).await?)
}

/// Run every round, aborting the current wait on Ctrl-C.
async fn simulate<T: Transport>(config: SimConfig, transport: T) -> Result<SimulationSummary> {
    let (trigger, shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; abandoning the current round");
            trigger.fire();
        }
    });

    let controller = CongestionController::new(config)?.with_shutdown(shutdown);
    let observer = Tee(ConsoleObserver::stdout(), LogObserver);
    let mut simulation = Simulation::new(controller, transport, observer);
    Ok(simulation.run().await?)
}

fn print_summary(summary: &SimulationSummary) {
    println!(
        "\n== Summary ({}) ==\nrounds={} acks={} timeouts={} final cwnd={} ssthresh={} \
         estimatedRTT={:.2}ms devRTT={:.2}ms timeout={:.2}ms",
        summary.mode,
        summary.rounds.len(),
        summary.acks_received(),
        summary.timeouts(),
        summary.final_cwnd,
        summary.final_ssthresh,
        summary.final_rtt.estimated_rtt_ms,
        summary.final_rtt.dev_rtt_ms,
        summary.final_rtt.timeout_interval_ms,
    );
}
