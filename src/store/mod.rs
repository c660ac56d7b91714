//! Suggestion store shared by every text input in the process
//!
//! The store is an arena keyed by [`InstanceId`]. Each entry owns the
//! instance's pretext, its suggestion list and selection, and three listener
//! sets:
//! - pretext changed (usually wired to provider dispatch)
//! - complete word (the widget splices the chosen term into its text)
//! - suggestions changed (the dropdown re-renders)
//!
//! All state for one instance sits behind a single lock, so mutations on that
//! instance happen in one total order. Notifications are queued under the same
//! lock and delivered afterwards by whichever caller started draining, with no
//! lock held. A caller returns once its own notifications have been delivered,
//! even when another thread is the one delivering them. A listener that calls
//! back into the store (a provider answering synchronously) only enqueues; its
//! event goes out after the current one.

mod listeners;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::error::{Result, SuggestError};
use crate::instance::{InstanceId, PretextVersion};

pub use listeners::{Listener, Listeners};

/// One completion candidate and the pretext it claims to complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Text to insert
    pub term: String,
    /// Tail of the pretext this term replaces, as seen by the provider
    pub matched_pretext: String,
}

/// Read-only copy of an instance's suggestion list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionSnapshot {
    pub items: Vec<Suggestion>,
    pub selected: Option<usize>,
}

impl SuggestionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected_item(&self) -> Option<&Suggestion> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

/// Fired after a new pretext has been recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PretextChanged {
    pub id: InstanceId,
    pub pretext: String,
    pub version: PretextVersion,
}

/// Fired when a suggestion is confirmed by key or pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteWord {
    pub id: InstanceId,
    pub term: String,
    pub matched_pretext: String,
}

/// Fired whenever the suggestion list or selection changes, including clears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionsChanged {
    pub id: InstanceId,
    pub suggestions: SuggestionSnapshot,
}

enum Notification {
    Pretext(PretextChanged),
    CompleteWord(CompleteWord),
    Suggestions(SuggestionsChanged),
}

/// A queued notification paired with the listeners present when it was popped.
enum Delivery {
    Pretext(PretextChanged, Vec<Listener<PretextChanged>>),
    CompleteWord(CompleteWord, Vec<Listener<CompleteWord>>),
    Suggestions(SuggestionsChanged, Vec<Listener<SuggestionsChanged>>),
}

impl Delivery {
    fn run(self) {
        match self {
            Delivery::Pretext(event, listeners) => listeners.iter().for_each(|l| l(&event)),
            Delivery::CompleteWord(event, listeners) => listeners.iter().for_each(|l| l(&event)),
            Delivery::Suggestions(event, listeners) => listeners.iter().for_each(|l| l(&event)),
        }
    }
}

#[derive(Default)]
struct SuggestionSet {
    items: Vec<Suggestion>,
    selected: Option<usize>,
}

impl SuggestionSet {
    fn snapshot(&self) -> SuggestionSnapshot {
        SuggestionSnapshot {
            items: self.items.clone(),
            selected: self.selected,
        }
    }

    /// Returns true if there was anything to clear.
    fn clear(&mut self) -> bool {
        let had = !self.items.is_empty() || self.selected.is_some();
        self.items.clear();
        self.selected = None;
        had
    }

    fn step(&mut self, forward: bool) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        let next = match self.selected {
            None => 0,
            Some(i) if forward => (i + 1) % len,
            Some(i) => i.checked_sub(1).unwrap_or(len - 1),
        };
        self.selected = Some(next);
        self.selected
    }
}

#[derive(Default)]
struct InstanceState {
    pretext: String,
    version: PretextVersion,
    suggestions: SuggestionSet,
    on_pretext: Listeners<PretextChanged>,
    on_complete_word: Listeners<CompleteWord>,
    on_suggestions: Listeners<SuggestionsChanged>,
    pending: VecDeque<Notification>,
    /// Notifications ever queued / fully delivered
    enqueued: u64,
    delivered: u64,
    /// Thread currently delivering notifications
    drainer: Option<ThreadId>,
}

impl InstanceState {
    fn suggestions_changed(&self, id: InstanceId) -> Notification {
        Notification::Suggestions(SuggestionsChanged {
            id,
            suggestions: self.suggestions.snapshot(),
        })
    }

    fn delivery(&self, notification: Notification) -> Delivery {
        match notification {
            Notification::Pretext(ev) => Delivery::Pretext(ev, self.on_pretext.snapshot()),
            Notification::CompleteWord(ev) => {
                Delivery::CompleteWord(ev, self.on_complete_word.snapshot())
            }
            Notification::Suggestions(ev) => {
                Delivery::Suggestions(ev, self.on_suggestions.snapshot())
            }
        }
    }

    fn detach(&mut self) {
        self.suggestions.clear();
        self.on_pretext.clear();
        self.on_complete_word.clear();
        self.on_suggestions.clear();
        self.pending.clear();
        // Dropped notifications count as delivered so waiters wake up.
        self.delivered = self.delivered.max(self.enqueued);
    }
}

struct InstanceSlot {
    state: Mutex<InstanceState>,
    progress: Condvar,
}

impl InstanceSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(InstanceState::default()),
            progress: Condvar::new(),
        }
    }

    // Listeners never run under this lock, so poisoning can only come from a
    // panic inside the store itself; the state is still consistent then.
    fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, state: MutexGuard<'a, InstanceState>) -> MutexGuard<'a, InstanceState> {
        self.progress.wait(state).unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver queued notifications until the queue is empty.
    ///
    /// The caller must have claimed the drainer role.
    fn drain(&self) {
        let mut guard = DrainGuard {
            slot: self,
            in_flight: false,
            done: false,
        };
        loop {
            let delivery = {
                let mut state = self.lock();
                if guard.in_flight {
                    state.delivered += 1;
                    guard.in_flight = false;
                    self.progress.notify_all();
                }
                match state.pending.pop_front() {
                    Some(n) => {
                        guard.in_flight = true;
                        state.delivery(n)
                    }
                    None => {
                        state.drainer = None;
                        guard.done = true;
                        self.progress.notify_all();
                        return;
                    }
                }
            };
            delivery.run();
        }
    }

    /// Queue `events` and return once they have all been delivered.
    ///
    /// Inside a listener on the draining thread this only queues: waiting
    /// there would wait on ourselves.
    fn publish<'a>(&'a self, mut state: MutexGuard<'a, InstanceState>, events: Vec<Notification>) {
        if events.is_empty() {
            return;
        }
        state.enqueued += events.len() as u64;
        state.pending.extend(events);
        let target = state.enqueued;
        let me = thread::current().id();

        while state.delivered < target {
            let drainer = state.drainer;
            match drainer {
                Some(t) if t == me => return,
                Some(_) => state = self.wait(state),
                None => {
                    state.drainer = Some(me);
                    drop(state);
                    self.drain();
                    state = self.lock();
                }
            }
        }
    }
}

/// Releases the drainer role if a listener panics mid-delivery.
struct DrainGuard<'a> {
    slot: &'a InstanceSlot,
    in_flight: bool,
    done: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut state = self.slot.lock();
        if self.in_flight {
            state.delivered += 1;
        }
        state.drainer = None;
        self.slot.progress.notify_all();
    }
}

/// Registry of per-instance suggestion state.
pub struct SuggestionStore {
    instances: DashMap<InstanceId, Arc<InstanceSlot>>,
}

impl SuggestionStore {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    /// Register a new instance. Returns false if it was already registered.
    pub fn register_instance(&self, id: InstanceId) -> bool {
        let mut inserted = false;
        self.instances.entry(id).or_insert_with(|| {
            inserted = true;
            Arc::new(InstanceSlot::new())
        });
        if inserted {
            debug!(instance = %id, "registered suggestion instance");
        }
        inserted
    }

    /// Drop an instance with all its suggestions and listeners.
    ///
    /// Returns false if the id was unknown, so a second call is harmless.
    pub fn unregister_instance(&self, id: InstanceId) -> bool {
        match self.instances.remove(&id) {
            Some((_, slot)) => {
                slot.lock().detach();
                slot.progress.notify_all();
                debug!(instance = %id, "unregistered suggestion instance");
                true
            }
            None => {
                debug!(instance = %id, "unregister of unknown instance ignored");
                false
            }
        }
    }

    pub fn is_registered(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Record a new pretext and invalidate the current suggestions.
    ///
    /// Listeners see the cleared list first, then the pretext change.
    pub fn update_pretext(&self, id: InstanceId, pretext: impl Into<String>) -> Result<PretextVersion> {
        let pretext = pretext.into();
        self.mutate(id, |state| {
            state.pretext = pretext.clone();
            state.version = state.version.next();
            trace!(instance = %id, version = %state.version, pretext = %pretext, "pretext updated");

            let mut events = Vec::with_capacity(2);
            if state.suggestions.clear() {
                events.push(state.suggestions_changed(id));
            }
            events.push(Notification::Pretext(PretextChanged {
                id,
                pretext,
                version: state.version,
            }));
            (state.version, events)
        })
    }

    pub fn pretext(&self, id: InstanceId) -> Result<String> {
        Ok(self.slot(id)?.lock().pretext.clone())
    }

    /// Append suggestions against whatever pretext is current.
    pub fn add_suggestions<I, S>(&self, id: InstanceId, matched_pretext: &str, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(id, None, matched_pretext, terms).map(|_| ())
    }

    /// Append suggestions computed for `version`.
    ///
    /// Returns `Ok(false)` and changes nothing if the pretext has moved on
    /// since that version was dispatched.
    pub fn add_suggestions_at<I, S>(
        &self,
        id: InstanceId,
        version: PretextVersion,
        matched_pretext: &str,
        terms: I,
    ) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(id, Some(version), matched_pretext, terms)
    }

    fn append<I, S>(
        &self,
        id: InstanceId,
        version: Option<PretextVersion>,
        matched_pretext: &str,
        terms: I,
    ) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate(id, |state| {
            if let Some(v) = version {
                if v < state.version {
                    debug!(instance = %id, stale = %v, current = %state.version, "dropping stale suggestions");
                    return (false, Vec::new());
                }
            }

            let was_empty = state.suggestions.items.is_empty();
            let before = state.suggestions.items.len();
            state
                .suggestions
                .items
                .extend(terms.into_iter().map(|term| Suggestion {
                    term: term.into(),
                    matched_pretext: matched_pretext.to_string(),
                }));

            if state.suggestions.items.len() == before {
                return (true, Vec::new());
            }
            if was_empty {
                state.suggestions.selected = Some(0);
            }
            trace!(
                instance = %id,
                added = state.suggestions.items.len() - before,
                "suggestions added"
            );
            (true, vec![state.suggestions_changed(id)])
        })
    }

    /// True if the instance has at least one suggestion. Unknown ids have none.
    pub fn has_suggestions(&self, id: InstanceId) -> bool {
        self.slot(id)
            .map(|slot| !slot.lock().suggestions.items.is_empty())
            .unwrap_or(false)
    }

    pub fn suggestions(&self, id: InstanceId) -> Result<SuggestionSnapshot> {
        Ok(self.slot(id)?.lock().suggestions.snapshot())
    }

    /// Move the selection down, wrapping to the top. No-op when empty.
    pub fn select_next(&self, id: InstanceId) -> Result<Option<usize>> {
        self.select_step(id, true)
    }

    /// Move the selection up, wrapping to the bottom. No-op when empty.
    pub fn select_previous(&self, id: InstanceId) -> Result<Option<usize>> {
        self.select_step(id, false)
    }

    fn select_step(&self, id: InstanceId, forward: bool) -> Result<Option<usize>> {
        self.mutate(id, |state| match state.suggestions.step(forward) {
            Some(i) => (Some(i), vec![state.suggestions_changed(id)]),
            None => (None, Vec::new()),
        })
    }

    /// Select an item directly, e.g. when the pointer hovers a list row.
    pub fn set_selected(&self, id: InstanceId, index: usize) -> Result<bool> {
        self.mutate(id, |state| {
            if index >= state.suggestions.items.len() {
                return (false, Vec::new());
            }
            if state.suggestions.selected == Some(index) {
                return (true, Vec::new());
            }
            state.suggestions.selected = Some(index);
            (true, vec![state.suggestions_changed(id)])
        })
    }

    /// Hand the selected suggestion to the complete-word listeners.
    ///
    /// Returns `None` when nothing is selected; the list is left as is.
    pub fn confirm_selected(&self, id: InstanceId) -> Result<Option<Suggestion>> {
        self.mutate(id, |state| {
            let Some(item) = state
                .suggestions
                .selected
                .and_then(|i| state.suggestions.items.get(i))
                .cloned()
            else {
                return (None, Vec::new());
            };
            let event = Notification::CompleteWord(CompleteWord {
                id,
                term: item.term.clone(),
                matched_pretext: item.matched_pretext.clone(),
            });
            (Some(item), vec![event])
        })
    }

    /// Complete a specific term (a click on a list row), then close the list.
    pub fn complete_term(&self, id: InstanceId, term: &str, matched_pretext: &str) -> Result<()> {
        self.mutate(id, |state| {
            let mut events = vec![Notification::CompleteWord(CompleteWord {
                id,
                term: term.to_string(),
                matched_pretext: matched_pretext.to_string(),
            })];
            state.suggestions.clear();
            events.push(state.suggestions_changed(id));
            ((), events)
        })
    }

    /// Empty the list and selection. Listeners are always told so an open
    /// dropdown closes.
    pub fn clear(&self, id: InstanceId) -> Result<()> {
        self.mutate(id, |state| {
            state.suggestions.clear();
            ((), vec![state.suggestions_changed(id)])
        })
    }

    pub fn add_pretext_listener(&self, id: InstanceId, listener: Listener<PretextChanged>) -> Result<bool> {
        Ok(self.slot(id)?.lock().on_pretext.add(listener))
    }

    pub fn remove_pretext_listener(&self, id: InstanceId, listener: &Listener<PretextChanged>) -> Result<bool> {
        Ok(self.slot(id)?.lock().on_pretext.remove(listener))
    }

    pub fn add_complete_word_listener(&self, id: InstanceId, listener: Listener<CompleteWord>) -> Result<bool> {
        Ok(self.slot(id)?.lock().on_complete_word.add(listener))
    }

    pub fn remove_complete_word_listener(
        &self,
        id: InstanceId,
        listener: &Listener<CompleteWord>,
    ) -> Result<bool> {
        Ok(self.slot(id)?.lock().on_complete_word.remove(listener))
    }

    pub fn add_suggestions_listener(
        &self,
        id: InstanceId,
        listener: Listener<SuggestionsChanged>,
    ) -> Result<bool> {
        Ok(self.slot(id)?.lock().on_suggestions.add(listener))
    }

    pub fn remove_suggestions_listener(
        &self,
        id: InstanceId,
        listener: &Listener<SuggestionsChanged>,
    ) -> Result<bool> {
        Ok(self.slot(id)?.lock().on_suggestions.remove(listener))
    }

    fn slot(&self, id: InstanceId) -> Result<Arc<InstanceSlot>> {
        // Clone out of the map so no shard lock is held while we work.
        match self.instances.get(&id) {
            Some(entry) => Ok(entry.value().clone()),
            None => {
                debug!(instance = %id, "operation on unknown instance");
                Err(SuggestError::UnknownInstance(id))
            }
        }
    }

    /// Apply `f` under the instance lock, then deliver its notifications
    /// before returning (see `InstanceSlot::publish`).
    fn mutate<T>(
        &self,
        id: InstanceId,
        f: impl FnOnce(&mut InstanceState) -> (T, Vec<Notification>),
    ) -> Result<T> {
        let slot = self.slot(id)?;
        let mut state = slot.lock();
        let (out, events) = f(&mut state);
        slot.publish(state, events);
        Ok(out)
    }
}

impl Default for SuggestionStore {
    fn default() -> Self {
        Self::new()
    }
}
