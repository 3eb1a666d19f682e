use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::state::PipelineShared;
use super::stats::EventNotice;

/// Notification collaborator
///
/// Best-effort: a failed notification is logged and counted, never retried,
/// and never undoes the stored event.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &EventNotice) -> Result<()>;

    /// Notifier name for logging
    fn name(&self) -> &str;
}

/// Logs events instead of sending them anywhere
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &EventNotice) -> Result<()> {
        info!(
            "Sound event on {}: {} (amplitude {}, {:.1}s at {})",
            notice.device_id,
            notice.handle,
            notice.trigger_amplitude,
            notice.duration_secs(),
            notice.timestamp.to_rfc3339()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Forward notices from the pipeline to `notifier` until the channel closes
pub async fn dispatch_notifications(
    mut rx: mpsc::UnboundedReceiver<EventNotice>,
    notifier: Arc<dyn Notifier>,
    shared: Arc<PipelineShared>,
) {
    info!("Notification dispatcher started ({})", notifier.name());

    while let Some(notice) = rx.recv().await {
        if let Err(e) = notifier.notify(&notice).await {
            error!("Failed to notify event {}: {:#}", notice.handle, e);
            shared.record_notify_failure();
        }
    }

    info!("Notification dispatcher stopped");
}
