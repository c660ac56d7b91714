//! Pretext extraction from input and IME composition events
//!
//! Plain input: the pretext is the text up to the caret, suppressed while a
//! composition is in progress. Composition updates: the host caret sits in
//! front of the characters being composed, so the composed data is appended
//! to the text before the caret. Composition updates are the only pretext
//! source while composing.

use crate::instance::InstanceId;
use crate::splice::floor_char_boundary;
use crate::store::SuggestionStore;

/// Tracks composition mode for one text input and de-duplicates pretexts.
#[derive(Debug, Default)]
pub struct PretextTracker {
    composing: bool,
}

impl PretextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn on_composition_start(&mut self) {
        self.composing = true;
    }

    pub fn on_composition_end(&mut self) {
        self.composing = false;
    }

    /// New pretext after a plain input change, if it differs from the
    /// recorded one and no composition is running.
    pub fn on_text_changed(
        &self,
        store: &SuggestionStore,
        id: InstanceId,
        text: &str,
        caret: usize,
    ) -> Option<String> {
        if self.composing {
            return None;
        }
        let pretext = &text[..floor_char_boundary(text, caret)];
        changed(store, id, pretext)
    }

    /// New pretext while composing: text before the caret plus the composed
    /// data. Empty composition data is ignored.
    pub fn on_composition_update(
        &self,
        store: &SuggestionStore,
        id: InstanceId,
        text: &str,
        caret_start: usize,
        data: &str,
    ) -> Option<String> {
        if data.is_empty() {
            return None;
        }
        let mut pretext = text[..floor_char_boundary(text, caret_start)].to_string();
        pretext.push_str(data);
        changed(store, id, &pretext)
    }
}

// Unknown instances have no recorded pretext, so nothing is reported.
fn changed(store: &SuggestionStore, id: InstanceId, pretext: &str) -> Option<String> {
    let recorded = store.pretext(id).ok()?;
    (recorded != pretext).then(|| pretext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SuggestionStore, InstanceId, PretextTracker) {
        let store = SuggestionStore::new();
        let id = InstanceId::new();
        store.register_instance(id);
        (store, id, PretextTracker::new())
    }

    #[test]
    fn test_pretext_is_text_before_caret() {
        let (store, id, tracker) = setup();
        assert_eq!(
            tracker.on_text_changed(&store, id, "hello world", 5),
            Some("hello".to_string())
        );
    }

    #[test]
    fn test_unchanged_pretext_is_not_reported() {
        let (store, id, tracker) = setup();
        store.update_pretext(id, "hel").unwrap();
        // Typing after the caret leaves the pretext alone.
        assert_eq!(tracker.on_text_changed(&store, id, "helxyz", 3), None);
        assert_eq!(tracker.on_text_changed(&store, id, "", 0), Some(String::new()));
    }

    #[test]
    fn test_composing_suppresses_plain_input() {
        let (store, id, mut tracker) = setup();
        tracker.on_composition_start();
        assert!(tracker.is_composing());
        assert_eq!(tracker.on_text_changed(&store, id, "ni", 2), None);

        tracker.on_composition_end();
        assert_eq!(
            tracker.on_text_changed(&store, id, "你", 3),
            Some("你".to_string())
        );
    }

    #[test]
    fn test_composition_update_appends_data() {
        let (store, id, mut tracker) = setup();
        tracker.on_composition_start();
        // Caret sits before the composing characters.
        let p = tracker.on_composition_update(&store, id, "hi 日", 3, "日本");
        assert_eq!(p, Some("hi 日本".to_string()));

        store.update_pretext(id, "hi 日本").unwrap();
        assert_eq!(tracker.on_composition_update(&store, id, "hi 日", 3, "日本"), None);
    }

    #[test]
    fn test_empty_composition_is_ignored() {
        let (store, id, tracker) = setup();
        assert_eq!(tracker.on_composition_update(&store, id, "abc", 3, ""), None);
    }

    #[test]
    fn test_caret_inside_multibyte_char_is_safe() {
        let (store, id, tracker) = setup();
        assert_eq!(
            tracker.on_text_changed(&store, id, "日本", 4),
            Some("日".to_string())
        );
        assert_eq!(
            tracker.on_text_changed(&store, id, "ab", 42),
            Some("ab".to_string())
        );
    }

    #[test]
    fn test_unknown_instance_reports_nothing() {
        let store = SuggestionStore::new();
        let tracker = PretextTracker::new();
        assert_eq!(tracker.on_text_changed(&store, InstanceId::new(), "abc", 3), None);
    }
}
