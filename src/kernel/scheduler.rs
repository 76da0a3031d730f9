use super::tags::{Arrival, PendingTag, PendingTags};

/// Side effect the driver performs for a fired tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagEffect {
    /// Interactive confirmation shown to the listener.
    Prompt(PendingTag),
    /// Immediate call to the tag's endpoint, no interaction.
    SilentCall(PendingTag),
}

impl TagEffect {
    pub fn tag(&self) -> &PendingTag {
        match self {
            TagEffect::Prompt(tag) | TagEffect::SilentCall(tag) => tag,
        }
    }
}

/// Result of one scheduler pass.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    pub fired: Option<TagEffect>,
    /// Tags dropped because playback passed them by more than the window.
    pub missed: Vec<PendingTag>,
}

/// Matches pending tags against the playback position.
pub struct TagScheduler {
    arrival_window_ms: u64,
}

impl TagScheduler {
    pub fn new(arrival_window_ms: u64) -> Self {
        Self { arrival_window_ms }
    }

    pub fn arrival_window_ms(&self) -> u64 {
        self.arrival_window_ms
    }

    /// Pure projection: pending set + playback position -> effect.
    ///
    /// Fires at most one tag per pass, the earliest due one. Fired and missed
    /// tags leave the set, so no tag can fire twice.
    pub fn schedule(&self, pending: &mut PendingTags, now_ms: u64) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();

        // 1. Fire the first due tag.
        let due = pending
            .iter()
            .position(|tag| tag.arrival(now_ms, self.arrival_window_ms) == Arrival::Due);
        if let Some(idx) = due {
            let tag = pending.remove_at(idx);
            outcome.fired = Some(if tag.category.is_silent() {
                TagEffect::SilentCall(tag)
            } else {
                TagEffect::Prompt(tag)
            });
        }

        // 2. Drop anything already passed.
        let window = self.arrival_window_ms;
        let mut missed = Vec::new();
        pending.retain(|tag| {
            if tag.arrival(now_ms, window) == Arrival::Missed {
                missed.push(tag.clone());
                false
            } else {
                true
            }
        });
        outcome.missed = missed;

        outcome
    }
}
