//! Persistence for captured events
//!
//! Each capture becomes one WAV file named after the device and the capture
//! time. The same store backs the HTTP file browser.

mod wav;

pub use wav::{EventStore, RecordingEntry, WavStore};
