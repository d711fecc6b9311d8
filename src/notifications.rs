//! Change notifications for attached UI surfaces.
//!
//! A broadcast channel; having no subscriber is the normal case.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// "Re-read storage" hints. Serialized as `{"action": "linksUpdated"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum LinkEvent {
    LinksUpdated,
    CategoriesUpdated,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<LinkEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Never fails. Returns how many listeners received the event.
    pub fn notify(&self, event: LinkEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("No listeners for {:?}", event);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.sender.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
