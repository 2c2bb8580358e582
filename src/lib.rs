//! wordwatch - Discord keyword notifications
//!
//! Users register words per channel (substring, exact, or regex); incoming
//! messages and their embeds are scanned, and matching users get a DM with a
//! one-click unregister button. Registrations live in a single JSON file.

pub mod config;
pub mod discord;
pub mod error;
pub mod matcher;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Result, WatchError};
pub use matcher::entry_matches;
pub use store::{AddOutcome, RemoveOutcome, WatchStore};
pub use types::{MatchMode, RemoveTarget, UnregisterAction, WatchEntry, WatchTable};
