//! Error types for the capture path.
//!
//! Initialization and collaborator failures use `anyhow`; a capture attempt
//! has its own outcome type so the pipeline can tell "no buffer" apart from
//! everything else.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to allocate capture buffer of {samples} samples")]
    Allocation { samples: usize },

    #[error("Capture already in progress")]
    Busy,
}
