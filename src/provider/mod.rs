//! Completion providers and pretext dispatch
//!
//! A provider is told about every pretext change and answers, whenever it
//! likes, through the [`SuggestionSink`] it was handed. Answers are tagged with
//! the pretext version they were computed for; the store drops them if the
//! user has typed on since.
//!
//! Providers:
//! - [`WordListProvider`]: fixed vocabulary, optional trigger char
//! - [`Spawned`]: runs any [`AsyncProvider`] on a tokio runtime

mod spawned;
mod words;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use tracing::{debug, instrument, warn};

use crate::error::{Result, SuggestError};
use crate::instance::{InstanceId, PretextVersion};
use crate::store::{PretextChanged, SuggestionStore};

pub use spawned::{AsyncProvider, Spawned, Suggestions};
pub use words::WordListProvider;

/// Something that can offer completions for a pretext.
pub trait Provider: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Fire-and-forget notification of a new pretext.
    ///
    /// Results go through `request.sink`, now or later. An `Err` here is
    /// logged and does not stop other providers from running.
    fn handle_pretext_changed(&self, request: PretextRequest) -> anyhow::Result<()>;
}

/// One pretext change as seen by a provider.
#[derive(Clone)]
pub struct PretextRequest {
    pub id: InstanceId,
    pub pretext: String,
    pub version: PretextVersion,
    pub sink: SuggestionSink,
}

/// Result channel from a provider back into the store.
///
/// Holds the store weakly; once the store is gone answers are dropped.
#[derive(Clone)]
pub struct SuggestionSink {
    store: Weak<SuggestionStore>,
    id: InstanceId,
    version: PretextVersion,
}

impl SuggestionSink {
    pub fn new(store: &Arc<SuggestionStore>, id: InstanceId, version: PretextVersion) -> Self {
        Self {
            store: Arc::downgrade(store),
            id,
            version,
        }
    }

    /// Deliver terms completing `matched_pretext`.
    ///
    /// Returns `Ok(false)` when the answer was stale or the store is gone.
    pub fn add<I, S>(&self, matched_pretext: &str, terms: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.store.upgrade() {
            Some(store) => store.add_suggestions_at(self.id, self.version, matched_pretext, terms),
            None => Ok(false),
        }
    }
}

/// Ordered provider list for one text input.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn push(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Tell every provider, in order, about a recorded pretext change.
    ///
    /// Failing or panicking providers are skipped over and returned.
    #[instrument(
        name = "providers.dispatch",
        skip(self, store, change),
        fields(instance = %change.id, version = %change.version, providers = self.providers.len())
    )]
    pub fn dispatch(&self, store: &Arc<SuggestionStore>, change: &PretextChanged) -> Vec<SuggestError> {
        let sink = SuggestionSink::new(store, change.id, change.version);
        let mut failures = Vec::new();

        for provider in &self.providers {
            let request = PretextRequest {
                id: change.id,
                pretext: change.pretext.clone(),
                version: change.version,
                sink: sink.clone(),
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| provider.handle_pretext_changed(request)));
            let message = match outcome {
                Ok(Ok(())) => {
                    debug!(provider = provider.name(), "provider notified");
                    continue;
                }
                Ok(Err(e)) => format!("{:#}", e),
                Err(panic) => panic_message(panic.as_ref()),
            };
            warn!(provider = provider.name(), error = %message, "provider failed");
            failures.push(SuggestError::ProviderFailure {
                provider: provider.name().to_string(),
                message,
            });
        }

        failures
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
