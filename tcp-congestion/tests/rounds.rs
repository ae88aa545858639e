//! Multi-round behaviour of the sender, driven by scripted peers.
//!
//! Timed tests run on tokio's paused clock, so acknowledgement delays and
//! timeouts elapse instantly and RTT samples are exact.

use std::time::Duration;

use tcp_congestion::config::MAX_ROUNDS;
use tcp_congestion::packet::PacketId;
use tcp_congestion::report::{NullObserver, RoundEvent};
use tcp_congestion::simulator::{ScriptedTransport, SimulatedLink};
use tcp_congestion::state::WindowUpdate;
use tcp_congestion::transport::Shutdown;
use tcp_congestion::{
    CongestionController, FaultConfig, Mode, SimConfig, SimError, Simulation, SimulationSummary,
    TransportError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn controller(mode: &str, rounds: i64) -> CongestionController {
    CongestionController::configure(mode, rounds).expect("configure")
}

async fn run(
    rounds: i64,
    script: ScriptedTransport,
) -> (SimulationSummary, ScriptedTransport, Vec<RoundEvent>) {
    let mut sim = Simulation::new(controller("TAHOE", rounds), script, Vec::<RoundEvent>::new());
    let summary = sim.run().await.expect("simulation failed");
    let (_, transport, events) = sim.into_parts();
    (summary, transport, events)
}

fn seqs(ids: &[PacketId]) -> Vec<u64> {
    ids.iter().map(|id| id.seq()).collect()
}

// ---------------------------------------------------------------------------
// Growth
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_start_then_congestion_avoidance() {
    let script = ScriptedTransport::new().acks(1 + 2 + 4 + 8 + 9 + 10, 10);
    let (summary, transport, _) = run(6, script).await;

    assert_eq!(summary.cwnd_trajectory(), vec![1, 2, 4, 8, 9, 10]);
    assert_eq!(summary.final_cwnd, 11);
    assert_eq!(summary.final_ssthresh, 8);
    assert_eq!(summary.timeouts(), 0);
    assert_eq!(transport.handshake, Some(6));
    assert!(transport.closed);

    let updates: Vec<_> = summary.rounds.iter().map(|r| r.update).collect();
    assert_eq!(
        updates,
        vec![
            WindowUpdate::SlowStart { cwnd: 2 },
            WindowUpdate::SlowStart { cwnd: 4 },
            WindowUpdate::SlowStart { cwnd: 8 },
            WindowUpdate::CongestionAvoidance { cwnd: 9 },
            WindowUpdate::CongestionAvoidance { cwnd: 10 },
            WindowUpdate::CongestionAvoidance { cwnd: 11 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn batches_are_contiguous_without_loss() {
    let script = ScriptedTransport::new().acks(7, 5);
    let (_, transport, _) = run(3, script).await;

    let sent: Vec<_> = transport.sent.iter().map(|b| seqs(&b.ids)).collect();
    assert_eq!(sent, vec![vec![1], vec![2, 3], vec![4, 5, 6, 7]]);
    let rounds: Vec<_> = transport.sent.iter().map(|b| b.round).collect();
    assert_eq!(rounds, vec![1, 2, 3]);
}

// ---------------------------------------------------------------------------
// Timeout
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn timeout_mid_round_rewinds_and_collapses() {
    // Rounds 1-2 grow cwnd to 4; round 3 loses its third packet (pkt6).
    let script = ScriptedTransport::new()
        .acks(1 + 2 + 2, 20)
        .silence()
        .acks(1, 20);
    let (summary, transport, events) = run(4, script).await;

    let third = &summary.rounds[2];
    assert_eq!(third.cwnd, 4);
    assert_eq!(third.acks_received, 2);
    assert_eq!(third.timed_out, Some(PacketId::new(6)));
    assert_eq!(third.update, WindowUpdate::Timeout { ssthresh: 2, cwnd: 1 });

    // Round 4 resends from the lost packet, not from the batch start.
    assert_eq!(seqs(&transport.sent[3].ids), vec![6]);
    // cwnd 1 < ssthresh 2: back in slow start.
    assert_eq!(summary.rounds[3].update, WindowUpdate::SlowStart { cwnd: 2 });

    let timeouts = events
        .iter()
        .filter(|e| matches!(e, RoundEvent::TimedOut { .. }))
        .count();
    assert_eq!(timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_timeouts_pin_threshold_at_zero() {
    let link = SimulatedLink::new(FaultConfig {
        loss_rate: 1.0,
        seed: Some(1),
        ..FaultConfig::default()
    });
    let mut sim = Simulation::new(controller("RENO", 4), link, Vec::<RoundEvent>::new());
    let summary = sim.run().await.unwrap();

    assert_eq!(summary.timeouts(), 4);
    assert_eq!(summary.cwnd_trajectory(), vec![1, 1, 1, 1]);
    assert_eq!(summary.final_ssthresh, 0);
    // Every round retries packet 1.
    assert_eq!(sim.controller().next_seq(), 1);
    // No sample was taken, so the timeout never moved.
    assert_eq!(summary.final_rtt.timeout_interval_ms, 1500.0);
}

#[tokio::test(start_paused = true)]
async fn zero_threshold_grows_linearly_after_loss() {
    let script = ScriptedTransport::new().silence().acks(1 + 2 + 3, 10);
    let (summary, _, _) = run(4, script).await;
    assert_eq!(summary.cwnd_trajectory(), vec![1, 1, 2, 3]);
    assert_eq!(summary.final_cwnd, 4);
    assert_eq!(summary.final_ssthresh, 0);
}

// ---------------------------------------------------------------------------
// Termination token
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn end_token_stops_round_but_not_run() {
    let script = ScriptedTransport::new()
        .ack(10) // round 1: pkt1
        .ack(10)
        .end(10) // round 2: pkt2 acked, END while waiting for pkt3
        .acks(2, 10); // round 3
    let (summary, transport, events) = run(3, script).await;

    assert_eq!(summary.rounds.len(), 3);
    let second = &summary.rounds[1];
    assert!(second.terminated);
    assert_eq!(second.acks_received, 1);
    assert_eq!(second.update, WindowUpdate::Unchanged { cwnd: 2 });

    // Round 3 continues after the speculative advance.
    assert_eq!(seqs(&transport.sent[2].ids), vec![4, 5]);
    assert_eq!(summary.final_cwnd, 4);

    assert!(events.iter().any(|e| matches!(
        e,
        RoundEvent::Terminated { round: 2, packet } if packet.seq() == 3
    )));
}

// ---------------------------------------------------------------------------
// Reporting and determinism
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn events_follow_round_order() {
    let script = ScriptedTransport::new().acks(3, 25);
    let (_, _, events) = run(2, script).await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            RoundEvent::Configured { .. } => "configured",
            RoundEvent::RoundStarted { .. } => "start",
            RoundEvent::Sent { .. } => "sent",
            RoundEvent::AckReceived { .. } => "ack",
            RoundEvent::TimedOut { .. } => "timeout",
            RoundEvent::Terminated { .. } => "end",
            RoundEvent::WindowUpdated { .. } => "update",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "configured",
            "start",
            "sent",
            "ack",
            "update",
            "start",
            "sent",
            "ack",
            "ack",
            "update"
        ]
    );
    assert_eq!(
        events[0],
        RoundEvent::Configured {
            mode: Mode::Tahoe,
            total_rounds: 2
        }
    );
}

#[tokio::test(start_paused = true)]
async fn identical_replays_give_identical_trajectories() {
    fn script() -> ScriptedTransport {
        ScriptedTransport::new()
            .ack(120)
            .ack(80)
            .ack(300)
            .ack(40)
            .silence()
            .ack(60)
            .acks(3, 90)
    }
    let (first, _, first_events) = run(5, script()).await;
    let (second, _, second_events) = run(5, script()).await;
    assert_eq!(first, second);
    assert_eq!(first_events, second_events);
}

#[tokio::test(start_paused = true)]
async fn lossless_link_matches_scripted_growth() {
    let link = SimulatedLink::new(FaultConfig {
        min_delay: Duration::from_millis(15),
        max_delay: Duration::from_millis(15),
        seed: Some(3),
        ..FaultConfig::default()
    });
    let mut sim = Simulation::new(controller("tahoe", 5), link, Vec::<RoundEvent>::new());
    let summary = sim.run().await.unwrap();
    assert_eq!(summary.cwnd_trajectory(), vec![1, 2, 4, 8, 9]);
    let samples: Vec<f64> = sim
        .observer()
        .iter()
        .filter_map(|e| match e {
            RoundEvent::AckReceived { sample_rtt_ms, .. } => Some(*sample_rtt_ms),
            _ => None,
        })
        .collect();
    assert_eq!(samples.len(), 1 + 2 + 4 + 8 + 9);
    for sample in samples {
        assert!((15.0..=16.0).contains(&sample), "sample {sample}");
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_run() {
    let (trigger, shutdown) = Shutdown::channel();
    let controller = CongestionController::new(SimConfig::new(Mode::Tahoe, 10).unwrap())
        .unwrap()
        .with_shutdown(shutdown);
    let script = ScriptedTransport::new().ack(10).silence();
    let mut sim = Simulation::new(controller, script, Vec::<RoundEvent>::new());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.fire();
    });

    let result = sim.run().await;
    assert!(matches!(result, Err(SimError::Cancelled)));
    assert!(!sim.transport().closed);
}

// ---------------------------------------------------------------------------
// Failures and limits
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn transport_failure_ends_run() {
    // Round 1 acks pkt1, round 2 acks pkt2 and then the connection drops.
    let script = ScriptedTransport::new().acks(2, 10).fail().acks(10, 10);
    let mut sim = Simulation::new(controller("TAHOE", 5), script, Vec::<RoundEvent>::new());

    let result = sim.run().await;

    assert!(
        matches!(result, Err(SimError::Transport(TransportError::Closed))),
        "got {result:?}"
    );
    let transport = sim.transport();
    let rounds: Vec<_> = transport.sent.iter().map(|b| b.round).collect();
    assert_eq!(rounds, vec![1, 2]);
    assert!(!transport.closed);
    // The acks scripted after the failure were never consumed.
    assert_eq!(transport.remaining(), 10);
}

#[test]
fn round_count_beyond_limit_is_invalid() {
    for rounds in [i64::from(MAX_ROUNDS) + 1, i64::from(u32::MAX)] {
        assert!(matches!(
            CongestionController::configure("TAHOE", rounds),
            Err(SimError::InvalidConfig(_))
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn largest_round_count_starts_without_upfront_cost() {
    let (trigger, shutdown) = Shutdown::channel();
    let controller = controller("TAHOE", i64::from(MAX_ROUNDS)).with_shutdown(shutdown);
    let script = ScriptedTransport::new().acks(1 + 2 + 4, 10);
    let mut sim = Simulation::new(controller, script, NullObserver);

    tokio::spawn(async move {
        // Three clean rounds take 70 ms; the fourth round then waits out
        // its first timeout.
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.fire();
    });

    let result = sim.run().await;
    assert!(matches!(result, Err(SimError::Cancelled)));
    assert_eq!(sim.transport().handshake, Some(MAX_ROUNDS));
    assert_eq!(sim.transport().sent.len(), 4);
}
