//! Error types for the jitter pipeline.

use thiserror::Error;

/// Errors surfaced by a generator instance.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The post-calibration e-bit distribution collapsed to (almost) a single
    /// value. The instance must be discarded and recreated; it will never
    /// emit another byte.
    #[error("degenerate e-bit stream: value {value} at fraction {fraction:.3}")]
    DegenerateStream {
        /// The modal e-bit value.
        value: u8,
        /// Fraction of the screened window holding that value.
        fraction: f64,
    },

    /// The producer side of a byte stream has shut down.
    #[error("byte stream closed")]
    StreamClosed,

    /// Configuration file could not be read.
    #[error("config io: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("config parse: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
