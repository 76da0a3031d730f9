use serde::{Deserialize, Serialize};
use std::fmt;

/// What firing a tag does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagCategory {
    #[serde(rename = "open_page")]
    OpenPage,
    #[serde(rename = "save_page")]
    SavePage,
    /// Fired as a silent external call instead of an interactive prompt.
    #[serde(rename = "API_call")]
    ApiCall,
}

impl TagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagCategory::OpenPage => "open_page",
            TagCategory::SavePage => "save_page",
            TagCategory::ApiCall => "API_call",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open_page" => Some(TagCategory::OpenPage),
            "save_page" => Some(TagCategory::SavePage),
            "API_call" => Some(TagCategory::ApiCall),
            _ => None,
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, TagCategory::ApiCall)
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved tag anchored to an absolute stream position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTag {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Destination (page URL or API endpoint).
    pub info: String,
    pub category: TagCategory,
    pub match_percentage: u32,
    pub similarity: f32,
    /// Absolute stream time in ms at which the trigger plays.
    pub data_position: u64,
    /// Window index of the detector hit that produced this tag.
    pub index: u64,
}

/// Outcome of evaluating one tag against the playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Not reached yet (or exactly at the position).
    Ahead,
    Due,
    /// Passed by more than the arrival window.
    Missed,
}

impl PendingTag {
    pub fn arrival(&self, now_ms: u64, arrival_window_ms: u64) -> Arrival {
        let diff = now_ms as i64 - self.data_position as i64;
        if diff <= 0 {
            Arrival::Ahead
        } else if diff as u64 <= arrival_window_ms {
            Arrival::Due
        } else {
            Arrival::Missed
        }
    }
}

/// Resolved tags waiting for playback to reach them.
///
/// Written by the resolver side, drained by the scheduler. Each tag leaves the
/// set exactly once: fired, missed, or cleared at stream end.
#[derive(Debug, Default)]
pub struct PendingTags {
    tags: Vec<PendingTag>,
}

impl PendingTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: PendingTag) {
        // Keep ordered by position so the earliest due tag fires first.
        let at = self
            .tags
            .partition_point(|t| t.data_position <= tag.data_position);
        self.tags.insert(at, tag);
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTag> {
        self.tags.iter()
    }

    pub fn remove_at(&mut self, idx: usize) -> PendingTag {
        self.tags.remove(idx)
    }

    pub fn retain(&mut self, f: impl FnMut(&PendingTag) -> bool) {
        self.tags.retain(f);
    }

    /// Drop every pending tag, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.tags.len();
        self.tags.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: &str, pos: u64) -> PendingTag {
        PendingTag {
            id: id.to_string(),
            name: String::new(),
            description: String::new(),
            info: "https://example.org".to_string(),
            category: TagCategory::OpenPage,
            match_percentage: 50,
            similarity: 0.9,
            data_position: pos,
            index: 0,
        }
    }

    #[test]
    fn arrival_window_is_half_open() {
        let t = tag("a", 4000);
        assert_eq!(t.arrival(3990, 1000), Arrival::Ahead);
        assert_eq!(t.arrival(4000, 1000), Arrival::Ahead);
        assert_eq!(t.arrival(4001, 1000), Arrival::Due);
        assert_eq!(t.arrival(5000, 1000), Arrival::Due);
        assert_eq!(t.arrival(5001, 1000), Arrival::Missed);
    }

    #[test]
    fn insert_keeps_position_order() {
        let mut tags = PendingTags::new();
        tags.insert(tag("b", 9000));
        tags.insert(tag("a", 3000));
        tags.insert(tag("c", 9000));
        let ids: Vec<&str> = tags.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn category_wire_names() {
        let parsed: TagCategory = serde_json::from_str("\"API_call\"").unwrap();
        assert_eq!(parsed, TagCategory::ApiCall);
        assert_eq!(TagCategory::parse("save_page"), Some(TagCategory::SavePage));
        assert_eq!(TagCategory::parse("popup"), None);
    }
}
