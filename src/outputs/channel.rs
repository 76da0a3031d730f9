use tokio::sync::mpsc;

use super::{InteractionAction, TagSink};
use crate::kernel::scheduler::TagEffect;

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Fired(TagEffect),
    Interaction { tag_id: String, action: InteractionAction },
}

/// Forwards everything to an embedding UI over a channel.
#[derive(Debug, Clone)]
pub struct ChannelTagSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelTagSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TagSink for ChannelTagSink {
    fn fire_tag(&self, effect: &TagEffect) {
        let _ = self.tx.send(UiEvent::Fired(effect.clone()));
    }

    fn report_interaction(&self, tag_id: &str, action: InteractionAction) {
        let _ = self.tx.send(UiEvent::Interaction {
            tag_id: tag_id.to_string(),
            action,
        });
    }
}
