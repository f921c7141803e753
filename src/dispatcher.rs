use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::messages::{ChatEvent, PostEvent};
use crate::pronouns::PronounCache;
use crate::render::Overlay;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn parse_frame(raw: &str) -> Result<ChatEvent, DispatchError> {
    Ok(serde_json::from_str(raw)?)
}

/// Routes inbound frames to the render engine, and to the pronoun cache
/// when enrichment is enabled.
#[derive(Clone)]
pub struct Dispatcher {
    overlay: Arc<Mutex<Overlay>>,
    pronouns: Option<Arc<PronounCache>>,
}

impl Dispatcher {
    pub fn new(overlay: Arc<Mutex<Overlay>>, pronouns: Option<Arc<PronounCache>>) -> Self {
        Dispatcher { overlay, pronouns }
    }

    /// Handle one frame. Rendering finishes before this returns; pronoun
    /// enrichment for a post continues on its own task, so later frames may
    /// render before it lands.
    pub async fn dispatch(&self, raw: &str) {
        let event = match parse_frame(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping frame: {e}");
                return;
            }
        };

        if matches!(event, ChatEvent::Unknown) {
            debug!("Ignoring frame with unknown msg_type");
            return;
        }
        debug!("{} {}", event.kind(), event.id().unwrap_or_default());

        self.overlay.lock().await.render(&event);

        if let ChatEvent::Post(post) = event {
            if self.pronouns.is_some() {
                let dispatcher = self.clone();
                tokio::spawn(async move { dispatcher.enrich(&post).await });
            }
        }
    }

    /// Resolve the author's pronouns and write them into the message's
    /// placeholder, if the message is still on screen.
    pub async fn enrich(&self, post: &PostEvent) {
        let Some(pronouns) = &self.pronouns else {
            return;
        };
        let text = pronouns.resolve(&post.login).await;
        if !self.overlay.lock().await.set_pronoun(&post.message_id, &text) {
            debug!("{} left the overlay before its pronouns resolved", post.message_id);
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
