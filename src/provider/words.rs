//! Fixed-vocabulary provider

use async_trait::async_trait;

use super::{AsyncProvider, PretextRequest, Provider, Suggestions};

/// Completes the word before the caret from a static word list.
///
/// With a trigger (`@`, `/`, `#`...) only words starting with it are
/// completed and the trigger is kept in the inserted term.
#[derive(Debug, Clone)]
pub struct WordListProvider {
    name: String,
    words: Vec<String>,
    trigger: Option<char>,
    min_chars: usize,
    limit: usize,
}

impl WordListProvider {
    pub fn new<I, S>(name: impl Into<String>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words: Vec<String> = words.into_iter().map(Into::into).collect();
        words.sort();
        words.dedup();
        Self {
            name: name.into(),
            words,
            trigger: None,
            min_chars: 1,
            limit: 8,
        }
    }

    pub fn trigger(mut self, trigger: char) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Minimum number of typed characters (after the trigger) before matching
    pub fn min_chars(mut self, n: usize) -> Self {
        self.min_chars = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = n.max(1);
        self
    }

    /// Terms for the word at the end of `pretext`, if any match.
    pub fn matches(&self, pretext: &str) -> Option<Suggestions> {
        let start = pretext
            .rfind(char::is_whitespace)
            .map(|i| i + pretext[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let word = &pretext[start..];

        let partial = match self.trigger {
            Some(t) => word.strip_prefix(t)?,
            None => word,
        };
        // A bare trigger may list everything; an empty word never does.
        if partial.chars().count() < self.min_chars || word.is_empty() {
            return None;
        }

        let needle = partial.to_lowercase();
        let terms: Vec<String> = self
            .words
            .iter()
            .filter(|w| w.to_lowercase().starts_with(&needle))
            .take(self.limit)
            .map(|w| match self.trigger {
                Some(t) => format!("{}{}", t, w),
                None => w.clone(),
            })
            .collect();

        if terms.is_empty() {
            return None;
        }
        Some(Suggestions {
            matched_pretext: word.to_string(),
            terms,
        })
    }
}

impl Provider for WordListProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_pretext_changed(&self, request: PretextRequest) -> anyhow::Result<()> {
        if let Some(found) = self.matches(&request.pretext) {
            request.sink.add(&found.matched_pretext, found.terms)?;
        }
        Ok(())
    }
}

#[async_trait]
impl AsyncProvider for WordListProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn suggest(&self, pretext: &str) -> anyhow::Result<Option<Suggestions>> {
        Ok(self.matches(pretext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::instance::InstanceId;
    use crate::provider::ProviderRegistry;
    use crate::store::{PretextChanged, SuggestionStore};

    fn commands() -> WordListProvider {
        WordListProvider::new("commands", ["join", "help", "history", "leave"]).trigger('/')
    }

    #[test]
    fn test_completes_last_word() {
        let p = WordListProvider::new("words", ["hello", "help", "world"]);
        let found = p.matches("say hel").unwrap();
        assert_eq!(found.matched_pretext, "hel");
        assert_eq!(found.terms, vec!["hello", "help"]);
    }

    #[test]
    fn test_matching_ignores_case() {
        let p = WordListProvider::new("words", ["Hello"]);
        assert_eq!(p.matches("HE").unwrap().terms, vec!["Hello"]);
    }

    #[test]
    fn test_trigger_is_required_and_kept() {
        let p = commands();
        assert!(p.matches("h").is_none());

        let found = p.matches("/h").unwrap();
        assert_eq!(found.matched_pretext, "/h");
        assert_eq!(found.terms, vec!["/help", "/history"]);
    }

    #[test]
    fn test_min_chars_and_limit() {
        let p = WordListProvider::new("w", ["aa", "ab", "ac"]).min_chars(2).limit(2);
        assert!(p.matches("a").is_none());
        assert_eq!(p.matches("a").map(|f| f.terms), None);

        let p = WordListProvider::new("w", ["aa", "ab", "ac"]).limit(2);
        assert_eq!(p.matches("a").unwrap().terms, vec!["aa", "ab"]);
    }

    #[test]
    fn test_trailing_space_means_no_word() {
        let p = WordListProvider::new("w", ["hello"]);
        assert!(p.matches("hello ").is_none());
        assert!(p.matches("").is_none());
    }

    #[test]
    fn test_empty_word_never_matches() {
        let p = WordListProvider::new("w", ["hello", "world"]).min_chars(0);
        assert!(p.matches("").is_none());
        assert!(p.matches("say ").is_none());

        let p = WordListProvider::new("w", ["join", "help"]).trigger('/').min_chars(0);
        assert_eq!(p.matches("/").unwrap().terms, vec!["/help", "/join"]);
    }

    #[test]
    fn test_handles_wide_whitespace() {
        let p = WordListProvider::new("w", ["日本語"]);
        let found = p.matches("あ\u{3000}日").unwrap();
        assert_eq!(found.matched_pretext, "日");
    }

    #[test]
    fn test_dispatch_fills_store() {
        let store = Arc::new(SuggestionStore::new());
        let id = InstanceId::new();
        store.register_instance(id);
        let registry = ProviderRegistry::new().with(commands());

        let version = store.update_pretext(id, "/jo").unwrap();
        let change = PretextChanged {
            id,
            pretext: "/jo".to_string(),
            version,
        };
        assert!(registry.dispatch(&store, &change).is_empty());

        let snap = store.suggestions(id).unwrap();
        assert_eq!(snap.items.len(), 1);
        assert_eq!(snap.items[0].term, "/join");
        assert_eq!(snap.items[0].matched_pretext, "/jo");
    }
}
