use std::io::Write;

use chronopulse_core::clock::{DeltaSource, SamplerSet};
use chronopulse_core::generator::{JitterCore, JitterGenerator};

pub fn run(count: usize, format: &str, raw_ebits: bool, config: Option<&str>) {
    let cfg = super::load_pipeline_config(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut written = 0usize;
    let mut emit = |out: &mut dyn Write, byte: u8| -> bool {
        let ok = if format == "hex" {
            let newline = if written % 32 == 31 { "\n" } else { "" };
            write!(out, "{byte:02x}{newline}").is_ok()
        } else {
            out.write_all(&[byte]).is_ok()
        };
        written += 1;
        // A closed pipe (e.g. `| head`) ends the stream quietly.
        ok && (count == 0 || written < count)
    };

    if raw_ebits {
        let mut sampler = SamplerSet::new(cfg.max_anomaly_run);
        let mut core = JitterCore::new(&cfg);
        loop {
            let delta = sampler.next_delta();
            if let Some(e_bit) = core.step(delta)
                && !emit(&mut out, e_bit)
            {
                break;
            }
        }
    } else {
        let mut generator = JitterGenerator::from_host_clock(&cfg);
        loop {
            match generator.next_byte() {
                Ok(byte) => {
                    if !emit(&mut out, byte) {
                        break;
                    }
                }
                Err(err) => {
                    eprintln!("generator stopped: {err}");
                    std::process::exit(1);
                }
            }
        }
    }

    if format == "hex" {
        let _ = writeln!(out);
    }
}
