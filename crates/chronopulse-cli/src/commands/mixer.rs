use std::sync::Arc;

use chronopulse_mixer::AppState;
use chronopulse_protocol::{EpochConfig, SystemClock};

pub fn run(host: &str, port: u16) {
    let cfg = EpochConfig::default();
    let base = format!("http://{host}:{port}");

    println!("Chronopulse Mixer v{}", chronopulse_protocol::VERSION);
    println!("   {base}");
    println!(
        "   epoch {} ms, commit window {} ms, honest threshold {:.0}%",
        cfg.epoch_ms,
        cfg.commit_window_ms,
        cfg.honest_threshold * 100.0
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /                API index (try: curl {base})");
    println!("     POST /commit          Submit a commitment");
    println!("     POST /reveal          Reveal a committed trace");
    println!("     GET  /pulse/{{epoch}}   Fetch a published pulse");
    println!("     GET  /health          Health check");
    println!();

    let state = AppState::new(cfg, Arc::new(SystemClock));
    let rt = tokio::runtime::Runtime::new().unwrap();
    if let Err(err) = rt.block_on(chronopulse_mixer::run_server(state, host, port)) {
        eprintln!("mixer failed: {err}");
        std::process::exit(1);
    }
}
