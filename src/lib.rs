//! suggestbox - caret-aware autocomplete engine
//!
//! The library holds the per-input suggestion state, provider dispatch,
//! key handling and completion splicing. The demo binary in `main.rs` hosts
//! one input line in a raw-mode terminal.

pub mod config;
pub mod error;
pub mod instance;
pub mod paths;
pub mod provider;
pub mod selection;
pub mod splice;
pub mod store;
pub mod suggestion_box;
pub mod terminal;
pub mod tracker;

pub use error::SuggestError;
pub use instance::{InstanceId, PretextVersion};
pub use store::SuggestionStore;
pub use suggestion_box::SuggestionBox;
