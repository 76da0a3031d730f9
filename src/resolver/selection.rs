use std::collections::HashSet;

use crate::kernel::tags::TagCategory;
use crate::services::fingerprint::SearchCandidate;

/// Which candidates may become tags.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    /// A candidate must score strictly above this.
    pub threshold: u32,
    pub actionable: HashSet<TagCategory>,
}

/// Candidate ids already turned into tags during this session.
#[derive(Debug, Default)]
pub struct SeenCandidates {
    ids: HashSet<String>,
}

impl SeenCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Pick the first qualifying, unseen candidate and mark it seen.
    pub fn select(
        &mut self,
        candidates: &[SearchCandidate],
        policy: &SelectionPolicy,
    ) -> Option<(SearchCandidate, TagCategory)> {
        let (candidate, category) = candidates.iter().find_map(|c| {
            let category = TagCategory::parse(&c.kind)?;
            let qualifies = !self.ids.contains(&c.id)
                && policy.actionable.contains(&category)
                && c.has_info()
                && c.match_percentage > policy.threshold;
            qualifies.then_some((c, category))
        })?;
        self.ids.insert(candidate.id.clone());
        Some((candidate.clone(), category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, kind: &str, info: &str, pct: u32) -> SearchCandidate {
        SearchCandidate {
            id: id.to_string(),
            name: Some(format!("tag {}", id)),
            description: None,
            kind: kind.to_string(),
            info: Some(info.to_string()),
            match_percentage: pct,
        }
    }

    fn policy(threshold: u32) -> SelectionPolicy {
        SelectionPolicy {
            threshold,
            actionable: [TagCategory::OpenPage, TagCategory::SavePage].into_iter().collect(),
        }
    }

    #[test]
    fn first_qualifying_candidate_wins() {
        let mut seen = SeenCandidates::new();
        let list = vec![
            candidate("1", "API_call", "https://hook", 90),
            candidate("2", "open_page", "", 80),
            candidate("3", "open_page", "https://a", 5),
            candidate("4", "save_page", "https://b", 20),
            candidate("5", "open_page", "https://c", 99),
        ];
        let (picked, category) = seen.select(&list, &policy(10)).unwrap();
        assert_eq!(picked.id, "4");
        assert_eq!(category, TagCategory::SavePage);
    }

    #[test]
    fn seen_candidates_are_never_reselected() {
        let mut seen = SeenCandidates::new();
        let list = vec![candidate("7", "open_page", "https://a", 50)];
        assert!(seen.select(&list, &policy(0)).is_some());
        assert!(seen.select(&list, &policy(0)).is_none());
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn threshold_is_strict() {
        let mut seen = SeenCandidates::new();
        let list = vec![candidate("8", "open_page", "https://a", 10)];
        assert!(seen.select(&list, &policy(10)).is_none());
        assert!(seen.is_empty(), "rejected candidates must not be marked seen");
    }
}
