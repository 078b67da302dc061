use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chronopulse_core::config::PipelineConfig;
use chronopulse_core::stream::spawn_stream;
use chronopulse_protocol::{
    Coordinator, EpochConfig, EpochOutcome, HashBeacon, LoopbackMixer, MixerHub, Participant,
    SystemClock, WallClock,
};

pub fn run(participants: usize, epochs: usize, trace_len: usize) {
    let cfg = EpochConfig {
        trace_len,
        ..EpochConfig::default()
    };

    println!("Chronopulse epoch run v{}", chronopulse_protocol::VERSION);
    println!(
        "   {participants} participant(s), {epochs} epoch(s), {trace_len} bytes per trace"
    );
    println!(
        "   epoch {} ms, commit window {} ms, reveal window {}..{} ms",
        cfg.epoch_ms,
        cfg.commit_window_ms,
        cfg.reveal_open_ms,
        cfg.reveal_open_ms + cfg.reveal_window_ms
    );
    println!();

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(run_async(cfg, participants, epochs));
}

async fn run_async(cfg: EpochConfig, participants: usize, epochs: usize) {
    let clock: Arc<dyn WallClock> = Arc::new(SystemClock);
    let mixer = LoopbackMixer::new(MixerHub::new(cfg.clone()), Arc::clone(&clock));

    let mut tasks = Vec::new();
    for _ in 0..participants {
        let stream = spawn_stream(PipelineConfig::default(), 4096);
        let mut coordinator = Coordinator::new(
            Participant::generate(),
            HashBeacon,
            mixer.clone(),
            mixer.blob_store(),
            cfg.clone(),
            Arc::clone(&clock),
            stream,
        );
        println!("  participant {}", coordinator.participant_id());
        tasks.push(tokio::spawn(
            async move { coordinator.run_epochs(epochs).await },
        ));
    }

    let mut seen_epochs = BTreeSet::new();
    let mut revealed = 0usize;
    let mut missed = 0usize;
    for task in tasks {
        let outcomes = task.await.expect("coordinator task panicked");
        for outcome in outcomes {
            seen_epochs.insert(outcome.epoch());
            match outcome {
                EpochOutcome::Revealed { epoch, .. } => {
                    revealed += 1;
                    println!("  epoch {epoch}: revealed");
                }
                EpochOutcome::Missed { epoch, reason } => {
                    missed += 1;
                    println!("  epoch {epoch}: missed ({reason:?})");
                }
            }
        }
    }
    println!();
    println!("  {revealed} reveal(s), {missed} miss(es)");
    println!();

    for epoch in seen_epochs {
        let deadline = epoch.reveal_deadline_ms(&cfg);
        let now = clock.now_ms();
        if deadline > now {
            tokio::time::sleep(Duration::from_millis(deadline - now)).await;
        }
        match mixer.pulse(epoch) {
            Ok(pulse) => {
                let head: String = pulse
                    .payload
                    .iter()
                    .take(16)
                    .map(|b| format!("{b:02x}"))
                    .collect();
                println!(
                    "  pulse {epoch}: {} bytes, honest {:.0}% ({} revealed, {} substituted)",
                    pulse.payload.len(),
                    pulse.honest_fraction * 100.0,
                    pulse.revealed,
                    pulse.substituted
                );
                println!("    payload[..16] = {head}");
            }
            Err(err) => println!("  pulse {epoch}: {err}"),
        }
    }
}
