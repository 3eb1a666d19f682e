pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod nats;
pub mod storage;

pub use audio::{
    AnalogSampler, Amplitude, AudioFile, Calibrator, CaptureBuffer, CaptureEngine,
    CaptureSettings, DcOffset, IioSampler, ScriptedSampler, TriggerDetector, WavSampler,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::CaptureError;
pub use event::{
    dispatch_notifications, EventNotice, EventPipeline, EventStats, LogNotifier, Notifier,
    PipelineConfig, PipelineShared, PipelineState, ShutdownGuard, StepOutcome,
};
pub use http::{bind_listener, create_router, AppState};
pub use nats::{EventMessage, NatsClient, NatsNotifier, StatusMessage};
pub use storage::{EventStore, RecordingEntry, WavStore};
