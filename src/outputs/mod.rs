//! The UI collaborator: where fired tags go.

pub mod channel;
pub mod http;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::kernel::scheduler::TagEffect;

pub use channel::{ChannelTagSink, UiEvent};
pub use http::HttpTagSink;

/// Listener interaction with a fired tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    Shown,
    Accepted,
    Declined,
    /// Silent API call performed.
    Called,
}

/// Receiver of fired tags. Both calls must return immediately.
pub trait TagSink: Send + Sync {
    fn fire_tag(&self, effect: &TagEffect);

    /// Fire-and-forget interaction telemetry.
    fn report_interaction(&self, tag_id: &str, action: InteractionAction);
}

/// Headless sink: logs what a UI would show.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTagSink;

impl TagSink for LoggingTagSink {
    fn fire_tag(&self, effect: &TagEffect) {
        match effect {
            TagEffect::Prompt(tag) => info!(
                "Tag: prompt {} \"{}\" -> {} (at {}ms, match {}%)",
                tag.category, tag.name, tag.info, tag.data_position, tag.match_percentage
            ),
            TagEffect::SilentCall(tag) => info!(
                "Tag: silent call -> {} (at {}ms)",
                tag.info, tag.data_position
            ),
        }
    }

    fn report_interaction(&self, tag_id: &str, action: InteractionAction) {
        info!("Tag: interaction {} {:?}", tag_id, action);
    }
}
