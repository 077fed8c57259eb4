//! Lifecycle events and sinks

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::stage::Stage;

/// One stage transition of one pool
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub signature: String,
    #[serde(serialize_with = "serialize_pool_id")]
    pub pool_id: Option<Pubkey>,
    pub from: Option<Stage>,
    pub to: Stage,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

fn serialize_pool_id<S: serde::Serializer>(
    pool_id: &Option<Pubkey>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match pool_id {
        Some(id) => serializer.serialize_some(&id.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Receives every transition, in order per pool
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LifecycleEvent);
}

/// Renders events as log lines
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LifecycleEvent) {
        let pool = event
            .pool_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = event.detail.as_deref().unwrap_or("");

        match event.to {
            Stage::Done | Stage::Skipped | Stage::Failed => info!(
                signature = %event.signature,
                pool = %pool,
                "{} -> {} {}",
                event.from.map(|s| s.to_string()).unwrap_or_default(),
                event.to,
                detail
            ),
            _ => debug!(
                signature = %event.signature,
                pool = %pool,
                "{} -> {} {}",
                event.from.map(|s| s.to_string()).unwrap_or_default(),
                event.to,
                detail
            ),
        }
    }
}

/// Forwards events to a bounded channel; drops them when it is full
pub struct ChannelSink {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &LifecycleEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!("Dropping lifecycle event for {}: {}", event.signature, e);
        }
    }
}
