use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How a registered word is compared against incoming text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// Substring containment
    #[serde(rename = "p")]
    Partial,
    /// Whole-text equality
    #[serde(rename = "e")]
    Exact,
    /// Regular expression search
    #[serde(rename = "r")]
    Regex,
}

impl MatchMode {
    /// Parse the one-letter mode used on the command surface.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "p" => Some(Self::Partial),
            "e" => Some(Self::Exact),
            "r" => Some(Self::Regex),
            _ => None,
        }
    }

    /// Human-readable label shown in command replies and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Partial => "partial match",
            Self::Exact => "exact match",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One registered keyword, owned by a (channel, user) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Short opaque identifier, 8 hex chars
    pub id: String,
    /// The registered pattern
    pub word: String,
    /// Matching strategy
    pub mode: MatchMode,
}

impl WatchEntry {
    /// Create a new entry with a freshly generated id.
    ///
    /// Ids are the first 8 hex chars of a v4 UUID; collisions are accepted
    /// as negligible and not checked against existing entries.
    pub fn new(word: impl Into<String>, mode: MatchMode) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            id,
            word: word.into(),
            mode,
        }
    }
}

/// Full registration table: channel id -> user id -> ordered entries.
///
/// Entry vectors preserve registration order. All keys are strings to match
/// the on-disk JSON shape.
pub type WatchTable = HashMap<String, HashMap<String, Vec<WatchEntry>>>;

/// Target of a `/notify remove` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveTarget {
    /// The literal `all`: clear every entry for the invoker in this channel
    All,
    /// A single entry id
    Id(String),
}

impl RemoveTarget {
    pub fn parse(raw: &str) -> Self {
        if raw == "all" {
            Self::All
        } else {
            Self::Id(raw.to_string())
        }
    }
}

/// Validated payload of the one-click unregister button.
///
/// The button's custom id carries `(user, channel, entry)` through Discord
/// and back. Parsing validates the numeric ids up front so a malformed or
/// foreign custom id is rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnregisterAction {
    pub user_id: u64,
    pub channel_id: u64,
    pub entry_id: String,
}

const UNREGISTER_PREFIX: &str = "unwatch";

impl UnregisterAction {
    pub fn new(user_id: u64, channel_id: u64, entry_id: impl Into<String>) -> Self {
        Self {
            user_id,
            channel_id,
            entry_id: entry_id.into(),
        }
    }

    /// Encode as a component custom id.
    pub fn to_custom_id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            UNREGISTER_PREFIX, self.user_id, self.channel_id, self.entry_id
        )
    }

    /// Decode a component custom id, rejecting anything malformed.
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.splitn(4, ':');
        if parts.next()? != UNREGISTER_PREFIX {
            return None;
        }
        let user_id = parts.next()?.parse::<u64>().ok()?;
        let channel_id = parts.next()?.parse::<u64>().ok()?;
        let entry_id = parts.next()?;
        if entry_id.is_empty() {
            return None;
        }
        Some(Self::new(user_id, channel_id, entry_id))
    }
}
