//! Push boundary towards the host.

use async_trait::async_trait;
use devsync_core::PropertyValue;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receives values discovered by polling.
///
/// The host implements this to update its own copy of a property. Writes the
/// host issues back into the accessory while `publish` runs are treated as
/// echoes and not sent to the device.
#[async_trait]
pub trait StatePublisher: Send + Sync {
    async fn publish(&self, property: &str, value: &PropertyValue);
}

/// Publisher that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl StatePublisher for NoopPublisher {
    async fn publish(&self, property: &str, value: &PropertyValue) {
        trace!("Dropping update {} = {}", property, value);
    }
}

/// A published property update.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub property: String,
    pub value: PropertyValue,
}

/// Publisher that forwards updates into a channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<StateUpdate>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StateUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StatePublisher for ChannelPublisher {
    async fn publish(&self, property: &str, value: &PropertyValue) {
        let update = StateUpdate {
            property: property.to_string(),
            value: value.clone(),
        };
        if self.tx.send(update).is_err() {
            debug!("Update receiver closed, dropping {} = {}", property, value);
        }
    }
}
