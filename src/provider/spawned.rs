//! Async providers run on a tokio runtime

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{PretextRequest, Provider};

/// Terms a provider offers for the tail of a pretext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestions {
    /// Tail of the pretext the terms complete
    pub matched_pretext: String,
    pub terms: Vec<String>,
}

/// Provider whose lookup is async (network, index, timers).
#[async_trait]
pub trait AsyncProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// `Ok(None)` means this provider has nothing for the pretext.
    async fn suggest(&self, pretext: &str) -> anyhow::Result<Option<Suggestions>>;
}

/// Adapts an [`AsyncProvider`] to [`Provider`] by spawning one task per
/// pretext change. There is no cancellation; late answers are dropped by
/// version when they reach the store.
pub struct Spawned<P> {
    inner: Arc<P>,
    handle: Handle,
    latency: Duration,
}

impl<P: AsyncProvider> Spawned<P> {
    pub fn new(provider: P, handle: Handle) -> Self {
        Self {
            inner: Arc::new(provider),
            handle,
            latency: Duration::ZERO,
        }
    }

    /// Delay every lookup, e.g. to stand in for a remote backend.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl<P: AsyncProvider> Provider for Spawned<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn handle_pretext_changed(&self, request: PretextRequest) -> anyhow::Result<()> {
        let inner = self.inner.clone();
        let latency = self.latency;

        self.handle.spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let found = match inner.suggest(&request.pretext).await {
                Ok(Some(found)) => found,
                Ok(None) => return,
                Err(e) => {
                    warn!(provider = inner.name(), instance = %request.id, error = %e, "async provider failed");
                    return;
                }
            };

            match request.sink.add(&found.matched_pretext, found.terms) {
                Ok(true) => {}
                Ok(false) => debug!(
                    provider = inner.name(),
                    instance = %request.id,
                    version = %request.version,
                    "async answer arrived after pretext moved on"
                ),
                Err(e) => debug!(provider = inner.name(), error = %e, "async answer for gone instance"),
            }
        });

        Ok(())
    }
}
