//! Text-input glue: one `SuggestionBox` per input widget
//!
//! Wires the pieces together for a host UI:
//! - input and composition events go through the tracker into the store
//! - recorded pretext changes are dispatched to the providers
//! - keys go through the selection state machine
//! - confirmed terms are spliced into the text, with the caret move held back
//!   until the host says it has rendered

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::Result;
use crate::instance::InstanceId;
use crate::provider::ProviderRegistry;
use crate::selection::{KeyDisposition, KeyIntent, SelectionState, SelectionStateMachine};
use crate::splice::{self, floor_char_boundary};
use crate::store::{CompleteWord, Listener, PretextChanged, SuggestionSnapshot, SuggestionStore};
use crate::tracker::PretextTracker;

/// Called with the new text after a completion was spliced in.
///
/// This is a synthetic change: it does not go back through pretext tracking.
pub type ChangeHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Default)]
struct Field {
    text: String,
    caret: usize,
    /// Caret to apply once the host has rendered the spliced text
    pending_caret: Option<usize>,
}

/// Suggestion engine attached to one text input.
pub struct SuggestionBox {
    id: InstanceId,
    store: Arc<SuggestionStore>,
    tracker: PretextTracker,
    field: Arc<Mutex<Field>>,
    pretext_listener: Listener<PretextChanged>,
    complete_listener: Listener<CompleteWord>,
    mounted: bool,
}

impl SuggestionBox {
    /// Register a new instance and hook up providers and splicing.
    pub fn mount(store: Arc<SuggestionStore>, providers: ProviderRegistry, separator: impl Into<String>) -> Self {
        Self::mount_with(store, providers, separator, None)
    }

    pub fn mount_with(
        store: Arc<SuggestionStore>,
        providers: ProviderRegistry,
        separator: impl Into<String>,
        on_change: Option<ChangeHandler>,
    ) -> Self {
        let id = InstanceId::new();
        store.register_instance(id);

        let field = Arc::new(Mutex::new(Field::default()));

        let weak = Arc::downgrade(&store);
        let pretext_listener: Listener<PretextChanged> = Arc::new(move |change: &PretextChanged| {
            if let Some(store) = weak.upgrade() {
                // Failures are already logged per provider.
                let _ = providers.dispatch(&store, change);
            }
        });

        let separator = separator.into();
        let target = field.clone();
        let complete_listener: Listener<CompleteWord> = Arc::new(move |word: &CompleteWord| {
            let text = {
                let mut field = lock(&target);
                let spliced = splice::splice(
                    &word.term,
                    &word.matched_pretext,
                    &field.text,
                    field.caret,
                    &separator,
                );
                debug!(instance = %word.id, term = %word.term, caret = spliced.caret, "completion spliced");
                field.caret = floor_char_boundary(&spliced.text, field.caret);
                field.pending_caret = Some(spliced.caret);
                field.text = spliced.text;
                field.text.clone()
            };
            if let Some(on_change) = &on_change {
                on_change(&text);
            }
        });

        // Freshly registered id, so these cannot fail.
        let _ = store.add_pretext_listener(id, pretext_listener.clone());
        let _ = store.add_complete_word_listener(id, complete_listener.clone());

        Self {
            id,
            store,
            tracker: PretextTracker::new(),
            field,
            pretext_listener,
            complete_listener,
            mounted: true,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn store(&self) -> &Arc<SuggestionStore> {
        &self.store
    }

    pub fn value(&self) -> String {
        lock(&self.field).text.clone()
    }

    pub fn caret(&self) -> usize {
        lock(&self.field).caret
    }

    pub fn has_suggestions(&self) -> bool {
        self.store.has_suggestions(self.id)
    }

    pub fn suggestions(&self) -> SuggestionSnapshot {
        self.store.suggestions(self.id).unwrap_or_default()
    }

    pub fn selection_state(&self) -> SelectionState {
        SelectionStateMachine::new(&self.store, self.id).state()
    }

    /// The user edited the text or moved the caret.
    pub fn on_input(&mut self, text: &str, caret: usize) {
        self.set_field(text, caret);
        if let Some(pretext) = self.tracker.on_text_changed(&self.store, self.id, text, caret) {
            self.record(pretext);
        }
    }

    pub fn on_composition_start(&mut self) {
        self.tracker.on_composition_start();
    }

    /// `caret_start` is where the host caret sits, in front of the
    /// characters still being composed.
    pub fn on_composition_update(&mut self, text: &str, caret_start: usize, data: &str) {
        if let Some(pretext) = self
            .tracker
            .on_composition_update(&self.store, self.id, text, caret_start, data)
        {
            self.record(pretext);
        }
    }

    pub fn on_composition_end(&mut self) {
        self.tracker.on_composition_end();
    }

    /// The host replaced the value programmatically. Emptying the field
    /// closes any open list.
    pub fn set_value(&mut self, text: &str) {
        let was_empty = lock(&self.field).text.is_empty();
        self.set_field(text, text.len());
        if text.is_empty() && !was_empty {
            self.report(self.store.clear(self.id));
        }
    }

    /// Route a key press. `Forward` means the host handles it itself.
    pub fn on_key(&mut self, intent: KeyIntent) -> KeyDisposition {
        let machine = SelectionStateMachine::new(&self.store, self.id);
        match machine.handle_key(intent) {
            Ok(disposition) => disposition,
            Err(e) => {
                warn!(instance = %self.id, error = %e, "key handling failed");
                KeyDisposition::Forward
            }
        }
    }

    /// Pointer click on a list row.
    pub fn on_item_click(&mut self, index: usize) {
        let Some(item) = self.suggestions().items.get(index).cloned() else {
            return;
        };
        self.report(self.store.complete_term(self.id, &item.term, &item.matched_pretext));
    }

    /// Pointer interaction somewhere outside the widget.
    pub fn on_outside_click(&mut self) {
        let machine = SelectionStateMachine::new(&self.store, self.id);
        if let Err(e) = machine.handle_outside_interaction() {
            warn!(instance = %self.id, error = %e, "dismiss failed");
        }
    }

    /// Call after the host rendered; returns the caret to apply, once.
    pub fn after_render(&mut self) -> Option<usize> {
        let mut field = lock(&self.field);
        let caret = field.pending_caret.take()?;
        field.caret = floor_char_boundary(&field.text, caret);
        Some(field.caret)
    }

    /// Detach from the store. Safe to call more than once; also run on drop.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        let _ = self.store.remove_complete_word_listener(self.id, &self.complete_listener);
        let _ = self.store.remove_pretext_listener(self.id, &self.pretext_listener);
        self.store.unregister_instance(self.id);
        lock(&self.field).pending_caret = None;
    }

    fn set_field(&self, text: &str, caret: usize) {
        let mut field = lock(&self.field);
        field.text = text.to_string();
        field.caret = floor_char_boundary(text, caret);
    }

    fn record(&self, pretext: String) {
        self.report(self.store.update_pretext(self.id, pretext).map(|_| ()));
    }

    fn report(&self, result: Result<()>) {
        if let Err(e) = result {
            warn!(instance = %self.id, error = %e, "suggestion store rejected update");
        }
    }
}

impl Drop for SuggestionBox {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn lock(field: &Mutex<Field>) -> MutexGuard<'_, Field> {
    field.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::WordListProvider;

    fn mounted(words: &[&str]) -> SuggestionBox {
        let store = Arc::new(SuggestionStore::new());
        let providers = ProviderRegistry::new().with(WordListProvider::new("words", words.iter().copied()));
        SuggestionBox::mount(store, providers, " ")
    }

    #[test]
    fn test_typing_fetches_suggestions() {
        let mut b = mounted(&["hello", "help"]);
        b.on_input("he", 2);
        assert!(b.has_suggestions());
        assert_eq!(b.suggestions().items.len(), 2);
        assert_eq!(b.selection_state(), SelectionState::Open);
    }

    #[test]
    fn test_confirm_splices_and_defers_caret() {
        let mut b = mounted(&["hello"]);
        b.on_input("hel world", 3);
        assert_eq!(b.on_key(KeyIntent::Enter), KeyDisposition::Consumed);

        assert_eq!(b.value(), "hello  world");
        assert!(!b.has_suggestions());
        assert_eq!(b.caret(), 3);

        assert_eq!(b.after_render(), Some(6));
        assert_eq!(b.caret(), 6);
        assert_eq!(b.after_render(), None);
    }

    #[test]
    fn test_unmount_drops_pending_caret() {
        let mut b = mounted(&["hello"]);
        b.on_input("hel", 3);
        b.on_key(KeyIntent::Tab);
        b.unmount();
        b.unmount();
        assert_eq!(b.after_render(), None);
        assert!(!b.store().is_registered(b.id()));
    }

    #[test]
    fn test_emptying_value_closes_list() {
        let mut b = mounted(&["hello"]);
        b.on_input("he", 2);
        assert!(b.has_suggestions());
        b.set_value("");
        assert!(!b.has_suggestions());
    }

    #[test]
    fn test_erasing_everything_stays_idle() {
        let store = Arc::new(SuggestionStore::new());
        let providers =
            ProviderRegistry::new().with(WordListProvider::new("words", ["alpha", "beta"]).min_chars(0));
        let mut b = SuggestionBox::mount(store, providers, " ");

        b.on_input("a", 1);
        assert_eq!(b.selection_state(), SelectionState::Open);
        b.on_input("", 0);
        assert_eq!(b.selection_state(), SelectionState::Idle);
        assert!(!b.has_suggestions());
    }

    #[test]
    fn test_composition_drives_pretext() {
        let mut b = mounted(&["日本語"]);
        b.on_composition_start();
        b.on_input("日", 0);
        assert!(!b.has_suggestions());

        b.on_composition_update("", 0, "日");
        assert!(b.has_suggestions());
        assert_eq!(b.store().pretext(b.id()).unwrap(), "日");
        b.on_composition_end();
    }

    #[test]
    fn test_change_handler_sees_spliced_text() {
        let store = Arc::new(SuggestionStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let providers = ProviderRegistry::new().with(WordListProvider::new("w", ["world"]));
        let mut b = SuggestionBox::mount_with(
            store,
            providers,
            " ",
            Some(Arc::new(move |text: &str| s.lock().unwrap().push(text.to_string()))),
        );

        b.on_input("hi wo", 5);
        b.on_item_click(0);
        assert_eq!(*seen.lock().unwrap(), vec!["hi world "]);
        assert!(!b.has_suggestions());
    }

    #[test]
    fn test_escape_then_other_keys_forward() {
        let mut b = mounted(&["hello"]);
        b.on_input("he", 2);
        assert_eq!(b.on_key(KeyIntent::Escape), KeyDisposition::Dismissed);
        assert_eq!(b.on_key(KeyIntent::Escape), KeyDisposition::Forward);
        assert_eq!(b.on_key(KeyIntent::Down), KeyDisposition::Forward);
    }

    #[test]
    fn test_drop_unregisters() {
        let store = Arc::new(SuggestionStore::new());
        let b = SuggestionBox::mount(store.clone(), ProviderRegistry::new(), " ");
        let id = b.id();
        assert!(store.is_registered(id));
        drop(b);
        assert!(!store.is_registered(id));
        assert_eq!(store.instance_count(), 0);
    }
}
