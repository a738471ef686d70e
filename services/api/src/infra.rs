use listing_intake::config::IntakeConfig;
use listing_intake::error::AppError;
use listing_intake::workflows::submission::{
    ChannelPostRef, ChannelPublisher, InMemorySubmissionRepository, IntakeError, NotifyError,
    Notifier, OwnerId, PublishError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivers owner notices to the log. Kept messages back the demo output.
#[derive(Default, Clone)]
pub(crate) struct LogNotifier {
    delivered: Arc<Mutex<Vec<(OwnerId, String)>>>,
}

impl Notifier for LogNotifier {
    fn send(&self, recipient: &OwnerId, content: &str) -> Result<(), NotifyError> {
        info!(owner_id = %recipient, message = %content, "owner notified");
        let mut guard = self
            .delivered
            .lock()
            .map_err(|_| NotifyError::Transport("notifier mutex poisoned".to_string()))?;
        guard.push((recipient.clone(), content.to_string()));
        Ok(())
    }
}

impl LogNotifier {
    pub(crate) fn delivered(&self) -> Vec<(OwnerId, String)> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Stand-in channel that logs each post and hands out sequential post ids.
#[derive(Default, Clone)]
pub(crate) struct LogChannelPublisher {
    sequence: Arc<AtomicU64>,
}

impl ChannelPublisher for LogChannelPublisher {
    fn publish(&self, channel: &str, content: &str) -> Result<ChannelPostRef, PublishError> {
        if channel.trim().is_empty() {
            return Err(PublishError::Rejected {
                channel: channel.to_string(),
                reason: "no channel configured".to_string(),
            });
        }
        let post_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            channel,
            post_id,
            characters = content.chars().count(),
            "listing posted"
        );
        Ok(ChannelPostRef {
            channel: channel.to_string(),
            post_id: post_id.to_string(),
        })
    }
}

/// In-memory store, mirrored to `data_path` when one is configured.
pub(crate) fn open_repository(
    config: &IntakeConfig,
) -> Result<InMemorySubmissionRepository, AppError> {
    match &config.data_path {
        Some(path) => InMemorySubmissionRepository::with_snapshot(path)
            .map_err(|err| AppError::from(IntakeError::from(err))),
        None => Ok(InMemorySubmissionRepository::new()),
    }
}
