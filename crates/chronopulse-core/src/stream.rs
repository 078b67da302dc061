//! Byte streaming: a dedicated generator thread behind a bounded channel.
//!
//! The pipeline has a strict sequential dependency per byte, so one OS
//! thread owns the whole generator and pumps bytes into a bounded queue.
//! Async consumers (the epoch coordinator) pull from the channel; the bound
//! provides backpressure so an idle consumer never accumulates an unbounded
//! buffer.

use std::thread;

use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::error::GeneratorError;
use crate::generator::JitterGenerator;

/// Consumer half of a spawned generator stream.
pub struct ByteStreamHandle {
    rx: mpsc::Receiver<u8>,
}

impl ByteStreamHandle {
    /// Wrap an existing channel. Lets callers stand in their own producer
    /// (replayed captures, throttled streams) for the generator thread.
    pub fn from_receiver(rx: mpsc::Receiver<u8>) -> Self {
        Self { rx }
    }

    /// Next corrected byte; `None` once the producer has shut down
    /// (degenerate stream or thread exit).
    pub async fn next_byte(&mut self) -> Option<u8> {
        self.rx.recv().await
    }

    /// Read exactly `n` bytes. Returns `Err(StreamClosed)` if the producer
    /// shuts down first; the partial buffer is dropped.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, GeneratorError> {
        let mut buf = Vec::with_capacity(n);
        while buf.len() < n {
            match self.rx.recv().await {
                Some(b) => buf.push(b),
                None => return Err(GeneratorError::StreamClosed),
            }
        }
        Ok(buf)
    }
}

/// Spawn a generator on its own thread, returning the consumer handle.
///
/// The thread runs until the consumer is dropped or the generator goes
/// fatal; a degenerate-stream verdict is logged and closes the channel.
pub fn spawn_stream(cfg: PipelineConfig, capacity: usize) -> ByteStreamHandle {
    let (tx, rx) = mpsc::channel(capacity);
    thread::Builder::new()
        .name("chronopulse-generator".into())
        .spawn(move || {
            let mut generator = JitterGenerator::from_host_clock(&cfg);
            loop {
                match generator.next_byte() {
                    Ok(byte) => {
                        if tx.blocking_send(byte).is_err() {
                            log::debug!("byte stream consumer dropped, stopping generator");
                            break;
                        }
                    }
                    Err(err) => {
                        log::error!("generator stopped: {err}");
                        break;
                    }
                }
            }
        })
        .expect("failed to spawn generator thread");
    ByteStreamHandle { rx }
}
