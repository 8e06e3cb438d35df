//! Transient user notices, published on the broadcast channel and rendered
//! as toasts.

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::BroadcastMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Cloneable publisher used by the player core and the stores.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl Notifier {
    pub fn new(tx: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }

    /// Publish a state-change message. Having no listeners is not an error.
    pub fn send(&self, msg: BroadcastMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn info(&self, text: impl Into<String>) {
        let text = text.into();
        info!("notice: {}", text);
        self.send(BroadcastMessage::Notice(Severity::Info, text));
    }

    pub fn success(&self, text: impl Into<String>) {
        let text = text.into();
        info!("notice: {}", text);
        self.send(BroadcastMessage::Notice(Severity::Success, text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        let text = text.into();
        warn!("notice: {}", text);
        self.send(BroadcastMessage::Notice(Severity::Warning, text));
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        error!("notice: {}", text);
        self.send(BroadcastMessage::Notice(Severity::Error, text));
    }
}
