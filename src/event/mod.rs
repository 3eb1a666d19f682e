//! Event pipeline
//!
//! This module ties the detector together:
//! - One-time DC offset calibration
//! - Threshold polling while armed
//! - Fixed-rate capture on trigger
//! - Handoff to storage, then to the notifier
//! - Post-event cooldown

mod notify;
mod pipeline;
mod state;
mod stats;

pub use notify::{dispatch_notifications, LogNotifier, Notifier};
pub use pipeline::{EventPipeline, PipelineConfig, ShutdownGuard, StepOutcome};
pub use state::{PipelineShared, PipelineState};
pub use stats::{EventNotice, EventRecord, EventStats};
