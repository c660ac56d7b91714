//! Keyboard-driven suggestion selection
//!
//! Two states per instance: `Idle` (no suggestions) and `Open`. While open,
//! arrows move the selection, Enter/Tab confirm, Escape dismisses. Anything
//! else goes back to the host's own key handling untouched.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::error::Result;
use crate::instance::InstanceId;
use crate::store::SuggestionStore;

/// Key press reduced to what the selection logic cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIntent {
    Up,
    Down,
    Enter,
    Tab,
    Escape,
    Other,
}

impl KeyIntent {
    pub fn from_key_code(code: KeyCode) -> Self {
        match code {
            KeyCode::Up => KeyIntent::Up,
            KeyCode::Down => KeyIntent::Down,
            KeyCode::Enter => KeyIntent::Enter,
            KeyCode::Tab => KeyIntent::Tab,
            KeyCode::Esc => KeyIntent::Escape,
            _ => KeyIntent::Other,
        }
    }
}

impl From<&KeyEvent> for KeyIntent {
    // Modified keys (Ctrl+Enter, Shift+Tab) belong to the host.
    fn from(event: &KeyEvent) -> Self {
        let plain = event.modifiers.difference(KeyModifiers::SHIFT).is_empty()
            && !(event.code == KeyCode::Tab && event.modifiers.contains(KeyModifiers::SHIFT));
        if plain {
            Self::from_key_code(event.code)
        } else {
            KeyIntent::Other
        }
    }
}

/// What the host should do with the key after we looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Handled; suppress the key's default action.
    Consumed,
    /// Dropdown closed; stop propagation but keep the default action, so an
    /// enclosing dialog does not also close.
    Dismissed,
    /// Not ours; pass to the host's own handler.
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Open,
}

/// Interprets key intents against one instance's suggestion list.
pub struct SelectionStateMachine<'a> {
    store: &'a SuggestionStore,
    id: InstanceId,
}

impl<'a> SelectionStateMachine<'a> {
    pub fn new(store: &'a SuggestionStore, id: InstanceId) -> Self {
        Self { store, id }
    }

    pub fn state(&self) -> SelectionState {
        match self.store.suggestions(self.id) {
            Ok(snap) if snap.selected.is_some() && !snap.is_empty() => SelectionState::Open,
            _ => SelectionState::Idle,
        }
    }

    /// Confirmation fires the store's complete-word listeners, which splice
    /// the term into the text, before the list is cleared.
    pub fn handle_key(&self, intent: KeyIntent) -> Result<KeyDisposition> {
        if self.state() == SelectionState::Idle {
            return Ok(KeyDisposition::Forward);
        }

        match intent {
            KeyIntent::Up => {
                self.store.select_previous(self.id)?;
                Ok(KeyDisposition::Consumed)
            }
            KeyIntent::Down => {
                self.store.select_next(self.id)?;
                Ok(KeyDisposition::Consumed)
            }
            KeyIntent::Enter | KeyIntent::Tab => {
                let confirmed = self.store.confirm_selected(self.id)?;
                debug!(instance = %self.id, term = ?confirmed.as_ref().map(|s| &s.term), "suggestion confirmed");
                self.store.clear(self.id)?;
                Ok(KeyDisposition::Consumed)
            }
            KeyIntent::Escape => {
                self.store.clear(self.id)?;
                Ok(KeyDisposition::Dismissed)
            }
            KeyIntent::Other => Ok(KeyDisposition::Forward),
        }
    }

    /// Pointer interaction outside the widget: close an open list.
    pub fn handle_outside_interaction(&self) -> Result<bool> {
        if self.state() == SelectionState::Idle {
            return Ok(false);
        }
        self.store.clear(self.id)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CompleteWord;
    use std::sync::{Arc, Mutex};

    fn open_store(terms: &[&str]) -> (SuggestionStore, InstanceId) {
        let store = SuggestionStore::new();
        let id = InstanceId::new();
        store.register_instance(id);
        store.update_pretext(id, "t").unwrap();
        store.add_suggestions(id, "t", terms.iter().copied()).unwrap();
        (store, id)
    }

    #[test]
    fn test_idle_forwards_everything() {
        let store = SuggestionStore::new();
        let id = InstanceId::new();
        store.register_instance(id);
        let sm = SelectionStateMachine::new(&store, id);
        assert_eq!(sm.state(), SelectionState::Idle);
        for intent in [KeyIntent::Up, KeyIntent::Enter, KeyIntent::Escape, KeyIntent::Other] {
            assert_eq!(sm.handle_key(intent).unwrap(), KeyDisposition::Forward);
        }
    }

    #[test]
    fn test_arrows_move_selection() {
        let (store, id) = open_store(&["t1", "t2", "t3"]);
        let sm = SelectionStateMachine::new(&store, id);
        assert_eq!(sm.state(), SelectionState::Open);

        assert_eq!(sm.handle_key(KeyIntent::Up).unwrap(), KeyDisposition::Consumed);
        assert_eq!(store.suggestions(id).unwrap().selected, Some(2));
        sm.handle_key(KeyIntent::Down).unwrap();
        sm.handle_key(KeyIntent::Down).unwrap();
        assert_eq!(store.suggestions(id).unwrap().selected, Some(1));
        assert_eq!(sm.state(), SelectionState::Open);
    }

    #[test]
    fn test_enter_and_tab_confirm_then_close() {
        for key in [KeyIntent::Enter, KeyIntent::Tab] {
            let (store, id) = open_store(&["t1", "t2"]);
            let seen = Arc::new(Mutex::new(None));
            let s = seen.clone();
            store
                .add_complete_word_listener(id, Arc::new(move |ev: &CompleteWord| {
                    *s.lock().unwrap() = Some(ev.term.clone());
                }))
                .unwrap();

            let sm = SelectionStateMachine::new(&store, id);
            sm.handle_key(KeyIntent::Down).unwrap();
            assert_eq!(sm.handle_key(key).unwrap(), KeyDisposition::Consumed);
            assert_eq!(seen.lock().unwrap().as_deref(), Some("t2"));
            assert_eq!(sm.state(), SelectionState::Idle);
        }
    }

    #[test]
    fn test_escape_dismisses() {
        let (store, id) = open_store(&["t1"]);
        let sm = SelectionStateMachine::new(&store, id);
        assert_eq!(sm.handle_key(KeyIntent::Escape).unwrap(), KeyDisposition::Dismissed);
        assert_eq!(sm.state(), SelectionState::Idle);
        assert!(!store.has_suggestions(id));
    }

    #[test]
    fn test_other_keys_pass_through_while_open() {
        let (store, id) = open_store(&["t1"]);
        let sm = SelectionStateMachine::new(&store, id);
        assert_eq!(sm.handle_key(KeyIntent::Other).unwrap(), KeyDisposition::Forward);
        assert_eq!(sm.state(), SelectionState::Open);
    }

    #[test]
    fn test_outside_click_closes_open_list() {
        let (store, id) = open_store(&["t1"]);
        let sm = SelectionStateMachine::new(&store, id);
        assert!(sm.handle_outside_interaction().unwrap());
        assert!(!sm.handle_outside_interaction().unwrap());
    }

    #[test]
    fn test_key_events_map_to_intents() {
        let plain = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(KeyIntent::from(&plain(KeyCode::Up)), KeyIntent::Up);
        assert_eq!(KeyIntent::from(&plain(KeyCode::Esc)), KeyIntent::Escape);
        assert_eq!(KeyIntent::from(&plain(KeyCode::Char('a'))), KeyIntent::Other);

        let ctrl_enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL);
        assert_eq!(KeyIntent::from(&ctrl_enter), KeyIntent::Other);
        let shift_tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::SHIFT);
        assert_eq!(KeyIntent::from(&shift_tab), KeyIntent::Other);
    }
}
