//! CLI for chronopulse — temporal-jitter entropy and commit-reveal pulses.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chronopulse")]
#[command(about = "chronopulse — temporal-jitter entropy and commit-reveal pulses")]
#[command(version = chronopulse_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream corrected entropy bytes to stdout (pipe-friendly)
    Stream {
        /// Total bytes (0 = infinite)
        #[arg(long, default_value = "0")]
        count: usize,

        /// Output format
        #[arg(long, default_value = "raw", value_parser = ["raw", "hex"])]
        format: String,

        /// Emit quantized e-bits straight from the pipeline, skipping LFSR
        /// correction and packet framing
        #[arg(long)]
        raw_ebits: bool,

        /// Path to a pipeline config JSON (defaults baked in)
        #[arg(long)]
        config: Option<String>,
    },

    /// Statistical analysis: histogram peak, Shannon entropy, compression
    /// ratio, chi-square
    Analyze {
        /// Number of bytes to collect
        #[arg(long, default_value = "50000")]
        samples: usize,

        /// Write the full report as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Path to a pipeline config JSON (defaults baked in)
        #[arg(long)]
        config: Option<String>,
    },

    /// Run commit-reveal participants against an in-process mixer
    Epoch {
        /// Number of participants to run
        #[arg(long, default_value = "3")]
        participants: usize,

        /// Number of consecutive epochs to run
        #[arg(long, default_value = "1")]
        epochs: usize,

        /// Bytes each participant contributes per epoch
        #[arg(long, default_value = "1024")]
        trace_len: usize,
    },

    /// Start the HTTP mixer service
    Mixer {
        /// Port to listen on
        #[arg(long, default_value = "8052")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stream {
            count,
            format,
            raw_ebits,
            config,
        } => commands::stream::run(count, &format, raw_ebits, config.as_deref()),
        Commands::Analyze {
            samples,
            json,
            config,
        } => commands::analyze::run(samples, json, config.as_deref()),
        Commands::Epoch {
            participants,
            epochs,
            trace_len,
        } => commands::epoch::run(participants, epochs, trace_len),
        Commands::Mixer { port, host } => commands::mixer::run(&host, port),
    }
}
