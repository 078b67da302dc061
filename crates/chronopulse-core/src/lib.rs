//! # chronopulse-core
//!
//! Temporal-jitter entropy pipeline: converts raw timing noise into a
//! bias-preserving byte stream through adaptive filtering, quantization, and
//! a bit-correcting shift register.
//!
//! ## Quick start
//!
//! ```no_run
//! use chronopulse_core::{JitterGenerator, PipelineConfig};
//!
//! let cfg = PipelineConfig::default();
//! let mut generator = JitterGenerator::from_host_clock(&cfg);
//! let byte = generator.next_byte().expect("healthy stream");
//! assert!(byte < 128);
//! ```
//!
//! ## Architecture
//!
//! Sampler → AdaptiveFilter/Quantizer → StateMachine → LfsrCorrector →
//! PacketAssembler → byte stream
//!
//! Each byte's production depends strictly on the previous sample, so a
//! generator runs on exactly one thread and is passed by exclusive
//! reference — no shared generator singleton. The stream deliberately
//! retains the natural skew of the timing-noise source: the LFSR stage
//! decorrelates, it does not whiten.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod generator;
pub mod lfsr;
pub mod packet;
pub mod quantizer;
pub mod stream;

pub use analysis::{StreamReport, stream_report};
pub use clock::{CoarseClock, DeltaSource, InstantClock, MonotonicClock, SamplerSet, TimingSampler};
pub use config::PipelineConfig;
pub use error::GeneratorError;
pub use filter::{AdaptiveFilter, LowPassFilter};
pub use generator::{JitterCore, JitterGenerator, Phase};
pub use lfsr::LfsrCorrector;
pub use packet::PacketAssembler;
pub use quantizer::Quantizer;
pub use stream::{ByteStreamHandle, spawn_stream};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
