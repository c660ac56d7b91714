//! Engine and demo configuration

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::runtime::Handle;
use tracing_subscriber::filter::{Directive, EnvFilter};

use crate::provider::{ProviderRegistry, Spawned, WordListProvider};

/// Filter used until the config file has been read
pub const DEFAULT_LOG_FILTER: &str = "suggestbox=info";

/// `RUST_LOG` plus one extra directive
pub fn log_filter(directive: &str) -> Result<EnvFilter> {
    let directive = directive
        .parse::<Directive>()
        .with_context(|| format!("invalid log filter {:?}", directive))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Top-level configuration file structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inserted after every completed term
    pub separator: String,
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
    /// Providers, in dispatch order
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            providers: vec![
                ProviderConfig {
                    name: "commands".to_string(),
                    trigger: Some('/'),
                    words: ["help", "join", "leave", "quit", "who"].map(String::from).to_vec(),
                    ..ProviderConfig::default()
                },
                ProviderConfig {
                    name: "people".to_string(),
                    trigger: Some('@'),
                    words: ["alice", "amir", "bob", "carol"].map(String::from).to_vec(),
                    latency_ms: 150,
                    ..ProviderConfig::default()
                },
            ],
        }
    }
}

/// Single word-list provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Name for logs
    pub name: String,
    /// Only complete words starting with this char (e.g. '@')
    pub trigger: Option<char>,
    /// Vocabulary
    pub words: Vec<String>,
    /// Characters to type (after the trigger) before suggesting
    pub min_chars: usize,
    /// Maximum suggestions per lookup
    pub limit: usize,
    /// Simulated lookup latency; non-zero runs the provider on tokio
    pub latency_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "words".to_string(),
            trigger: None,
            words: Vec::new(),
            min_chars: 1,
            limit: 8,
            latency_ms: 0,
        }
    }
}

impl ProviderConfig {
    fn word_list(&self) -> WordListProvider {
        let provider = WordListProvider::new(self.name.clone(), self.words.iter().cloned())
            .min_chars(self.min_chars)
            .limit(self.limit);
        match self.trigger {
            Some(t) => provider.trigger(t),
            None => provider,
        }
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults if missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        tracing::info!(
            "loaded {} providers from {}",
            config.providers.len(),
            path.display()
        );

        Ok(config)
    }

    /// Build the provider list; delayed providers are spawned on `handle`.
    pub fn providers(&self, handle: &Handle) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for p in &self.providers {
            let words = p.word_list();
            if p.latency_ms > 0 {
                let spawned = Spawned::new(words, handle.clone())
                    .with_latency(Duration::from_millis(p.latency_ms));
                registry.push(Arc::new(spawned));
            } else {
                registry.push(Arc::new(words));
            }
        }
        registry
    }
}
