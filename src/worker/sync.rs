//! Background sync
//!
//! Acknowledges sync triggers. The sync routine itself transfers nothing yet.

use serde::Serialize;
use tracing::{debug, info};

/// What happened for a sync tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Tag matched and the sync routine ran
    Synced,
    /// Tag is not handled by this worker
    Ignored,
}

/// Handles named sync triggers.
#[derive(Debug, Clone)]
pub struct BackgroundSync {
    tag: String,
}

impl BackgroundSync {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Runs the sync routine when `tag` is ours. Never fails.
    pub async fn on_sync(&self, tag: &str) -> SyncOutcome {
        if tag != self.tag {
            debug!("Ignoring sync tag {}", tag);
            return SyncOutcome::Ignored;
        }

        sync_data().await;
        SyncOutcome::Synced
    }
}

/// Pushes pending to-do changes upstream. Nothing is queued offline yet,
/// so there is nothing to send.
async fn sync_data() {
    info!("Background sync running");
}
