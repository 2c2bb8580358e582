use crate::error::{Result, StoreError};
use crate::types::{MatchMode, RemoveTarget, WatchEntry, WatchTable};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Outcome of an add operation, reported back to the invoking user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was appended and persisted
    Added(WatchEntry),
    /// An entry with the same (word, mode) already exists; nothing changed
    Duplicate,
}

/// Outcome of a remove operation, reported back to the invoking user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Every entry for the (channel, user) pair was cleared
    ClearedAll,
    /// The entry with this id was removed
    Removed(String),
    /// No entry had the requested id; nothing changed
    NotFound,
}

/// Registration store backed by a single JSON file.
///
/// Every operation takes the store lock, loads the full table, mutates a
/// copy, and writes the whole table back. Serializing access through the
/// mutex is what keeps load-mutate-save from losing updates between
/// concurrently delivered events; the file itself stays last-write-wins.
#[derive(Debug)]
pub struct WatchStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl WatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full table from disk. A missing file is an empty table, not
    /// an error; an unreadable or malformed file is.
    fn load(&self) -> Result<WatchTable> {
        if !self.path.exists() {
            return Ok(WatchTable::new());
        }
        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| StoreError::ReadFailed {
                path: self.path.display().to_string(),
                source,
            })?;
        let table =
            serde_json::from_str(&contents).map_err(|source| StoreError::ParseFailed {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(table)
    }

    /// Overwrite the backing file with the full table, pretty-printed.
    ///
    /// Writes a sibling temp file then renames it over the target, so a
    /// crash mid-write never leaves a truncated table behind. serde_json
    /// emits non-ASCII text verbatim, which is what we want for words
    /// registered in any language.
    fn save(&self, table: &WatchTable) -> Result<()> {
        let json = serde_json::to_string_pretty(table)
            .map_err(|source| StoreError::SerializeFailed { source })?;

        let tmp = self.path.with_extension("json.tmp");
        let write_err = |source| StoreError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!("Persisted registration table to {}", self.path.display());
        Ok(())
    }

    /// Register a new word for (channel, user).
    ///
    /// Duplicate means an entry with the same (word, mode) already exists in
    /// that list; the table is left untouched and nothing is persisted.
    pub async fn add(
        &self,
        channel_id: &str,
        user_id: &str,
        word: &str,
        mode: MatchMode,
    ) -> Result<AddOutcome> {
        let _guard = self.lock.lock().await;
        let mut table = self.load()?;
        let entries = table
            .entry(channel_id.to_string())
            .or_default()
            .entry(user_id.to_string())
            .or_default();

        if entries.iter().any(|e| e.word == word && e.mode == mode) {
            return Ok(AddOutcome::Duplicate);
        }

        let entry = WatchEntry::new(word, mode);
        entries.push(entry.clone());
        self.save(&table)?;
        info!(
            "Registered word for user {} in channel {} (id {})",
            user_id, channel_id, entry.id
        );
        Ok(AddOutcome::Added(entry))
    }

    /// Remove one entry by id, or all entries, for (channel, user).
    ///
    /// Clearing with `all` keeps the (channel, user) key with an empty list,
    /// so a deliberately emptied registration set stays distinguishable from
    /// one that never existed.
    pub async fn remove(
        &self,
        channel_id: &str,
        user_id: &str,
        target: &RemoveTarget,
    ) -> Result<RemoveOutcome> {
        let _guard = self.lock.lock().await;
        let mut table = self.load()?;

        match target {
            RemoveTarget::All => {
                table
                    .entry(channel_id.to_string())
                    .or_default()
                    .insert(user_id.to_string(), Vec::new());
                self.save(&table)?;
                info!(
                    "Cleared all registrations for user {} in channel {}",
                    user_id, channel_id
                );
                Ok(RemoveOutcome::ClearedAll)
            }
            RemoveTarget::Id(id) => {
                // A pure miss must not grow the table with empty keys
                let Some(entries) = table
                    .get_mut(channel_id)
                    .and_then(|users| users.get_mut(user_id))
                else {
                    return Ok(RemoveOutcome::NotFound);
                };
                let before = entries.len();
                entries.retain(|e| &e.id != id);
                if entries.len() == before {
                    return Ok(RemoveOutcome::NotFound);
                }
                self.save(&table)?;
                info!(
                    "Removed registration {} for user {} in channel {}",
                    id, user_id, channel_id
                );
                Ok(RemoveOutcome::Removed(id.clone()))
            }
        }
    }

    /// Remove an entry by id from a specific (scope, user) pair.
    ///
    /// Backs the one-click unregister button; the id alone identifies the
    /// entry within that pair, no further ownership check is made. Returns
    /// whether anything was removed.
    pub async fn remove_by_id_anywhere(
        &self,
        scope_id: &str,
        user_id: &str,
        entry_id: &str,
    ) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut table = self.load()?;
        let Some(entries) = table
            .get_mut(scope_id)
            .and_then(|users| users.get_mut(user_id))
        else {
            return Ok(false);
        };

        let before = entries.len();
        entries.retain(|e| e.id != entry_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&table)?;
        info!(
            "Removed registration {} for user {} in scope {} via unregister button",
            entry_id, user_id, scope_id
        );
        Ok(true)
    }

    /// List registrations for (channel, user).
    ///
    /// `None` means the pair was never registered; `Some(vec![])` means it
    /// exists but is currently empty.
    pub async fn list(&self, channel_id: &str, user_id: &str) -> Result<Option<Vec<WatchEntry>>> {
        let _guard = self.lock.lock().await;
        let table = self.load()?;
        Ok(table
            .get(channel_id)
            .and_then(|users| users.get(user_id))
            .cloned())
    }

    /// Everything registered under a channel, for the message scan.
    ///
    /// `None` when the channel has no registrations at all, which lets the
    /// dispatcher bail out before doing any per-user work.
    pub async fn channel_watchers(
        &self,
        channel_id: &str,
    ) -> Result<Option<HashMap<String, Vec<WatchEntry>>>> {
        let _guard = self.lock.lock().await;
        let table = self.load()?;
        Ok(table.get(channel_id).cloned())
    }

    /// Delete a user's registrations across a set of channels, reacting to
    /// a member leaving or being banned from the guild that owns them.
    ///
    /// The table is keyed by channel, so the caller passes the ids of every
    /// channel in the affected guild; channels outside that set (other
    /// guilds) and other users' lists are untouched. Returns how many
    /// channel lists were removed; persists only when at least one was.
    pub async fn purge_user_in_channels(
        &self,
        channel_ids: &[String],
        user_id: &str,
    ) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut table = self.load()?;
        let mut removed = 0;
        for channel_id in channel_ids {
            let Some(users) = table.get_mut(channel_id) else {
                continue;
            };
            if users.remove(user_id).is_some() {
                removed += 1;
                if users.is_empty() {
                    table.remove(channel_id);
                }
            }
        }
        if removed == 0 {
            return Ok(0);
        }
        self.save(&table)?;
        info!(
            "Purged {} registration lists for departed user {}",
            removed, user_id
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> WatchStore {
        WatchStore::new(dir.path().join("notify_words.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_table() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.list("c1", "u1").await.unwrap(), None);
        assert_eq!(store.channel_watchers("c1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_persists_and_lists_in_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let AddOutcome::Added(first) = store
            .add("c1", "u1", "sale", MatchMode::Partial)
            .await
            .unwrap()
        else {
            panic!("expected Added");
        };
        let AddOutcome::Added(second) = store
            .add("c1", "u1", "restock", MatchMode::Exact)
            .await
            .unwrap()
        else {
            panic!("expected Added");
        };

        let entries = store.list("c1", "u1").await.unwrap().unwrap();
        assert_eq!(entries, vec![first, second]);

        // A second store over the same file sees the persisted table
        let reopened = WatchStore::new(store.path());
        assert_eq!(
            reopened.list("c1", "u1").await.unwrap().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn duplicate_word_and_mode_is_rejected_without_mutation() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .add("c1", "u1", "sale", MatchMode::Partial)
            .await
            .unwrap();
        let outcome = store
            .add("c1", "u1", "sale", MatchMode::Partial)
            .await
            .unwrap();
        assert_eq!(outcome, AddOutcome::Duplicate);
        assert_eq!(store.list("c1", "u1").await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_word_under_different_modes_both_register() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(matches!(
            store.add("c1", "u1", "sale", MatchMode::Partial).await.unwrap(),
            AddOutcome::Added(_)
        ));
        assert!(matches!(
            store.add("c1", "u1", "sale", MatchMode::Exact).await.unwrap(),
            AddOutcome::Added(_)
        ));
        assert_eq!(store.list("c1", "u1").await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn remove_all_clears_only_that_pair() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.add("c1", "u1", "sale", MatchMode::Partial).await.unwrap();
        store.add("c1", "u2", "sale", MatchMode::Partial).await.unwrap();
        store.add("c2", "u1", "sale", MatchMode::Partial).await.unwrap();

        let outcome = store
            .remove("c1", "u1", &RemoveTarget::All)
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::ClearedAll);

        // The cleared pair exists as an explicit empty list
        assert_eq!(store.list("c1", "u1").await.unwrap(), Some(vec![]));
        // Other users and channels are untouched
        assert_eq!(store.list("c1", "u2").await.unwrap().unwrap().len(), 1);
        assert_eq!(store.list("c2", "u1").await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_by_id_and_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let AddOutcome::Added(entry) = store
            .add("c1", "u1", "sale", MatchMode::Partial)
            .await
            .unwrap()
        else {
            panic!("expected Added");
        };

        let outcome = store
            .remove("c1", "u1", &RemoveTarget::Id("bogus123".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::NotFound);
        assert_eq!(store.list("c1", "u1").await.unwrap().unwrap().len(), 1);

        let outcome = store
            .remove("c1", "u1", &RemoveTarget::Id(entry.id.clone()))
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed(entry.id));
        assert_eq!(store.list("c1", "u1").await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn remove_by_id_anywhere_ignores_missing_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(!store
            .remove_by_id_anywhere("c1", "u1", "deadbeef")
            .await
            .unwrap());

        let AddOutcome::Added(entry) = store
            .add("c1", "u1", "sale", MatchMode::Partial)
            .await
            .unwrap()
        else {
            panic!("expected Added");
        };
        assert!(store
            .remove_by_id_anywhere("c1", "u1", &entry.id)
            .await
            .unwrap());
        // Second click on the same button: already gone
        assert!(!store
            .remove_by_id_anywhere("c1", "u1", &entry.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn purge_deletes_the_user_in_every_listed_channel() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // Two channels in the departed guild, one channel elsewhere
        store.add("c1", "u1", "sale", MatchMode::Partial).await.unwrap();
        store.add("c2", "u1", "sale", MatchMode::Partial).await.unwrap();
        store.add("c1", "u2", "sale", MatchMode::Partial).await.unwrap();
        store.add("d1", "u1", "sale", MatchMode::Partial).await.unwrap();

        let guild_channels = vec!["c1".to_string(), "c2".to_string(), "c9".to_string()];
        let removed = store
            .purge_user_in_channels(&guild_channels, "u1")
            .await
            .unwrap();
        assert_eq!(removed, 2);

        assert_eq!(store.list("c1", "u1").await.unwrap(), None);
        assert_eq!(store.list("c2", "u1").await.unwrap(), None);
        // Other users in the guild and the user's other-guild channel survive
        assert_eq!(store.list("c1", "u2").await.unwrap().unwrap().len(), 1);
        assert_eq!(store.list("d1", "u1").await.unwrap().unwrap().len(), 1);

        // Purging again is a no-op
        assert_eq!(
            store
                .purge_user_in_channels(&guild_channels, "u1")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn purge_keyed_on_a_foreign_id_removes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // Entries live under channel keys; a guild id is never a table key,
        // so a purge that only names the guild must leave them alone
        store.add("c1", "u1", "sale", MatchMode::Partial).await.unwrap();

        let removed = store
            .purge_user_in_channels(&["g1".to_string()], "u1")
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.list("c1", "u1").await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pure_miss_remove_does_not_create_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let outcome = store
            .remove("c1", "u1", &RemoveTarget::Id("deadbeef".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::NotFound);

        // Nothing was materialized, nothing was persisted
        assert_eq!(store.list("c1", "u1").await.unwrap(), None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn channel_watchers_returns_every_user_under_a_channel() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.add("c1", "u1", "sale", MatchMode::Partial).await.unwrap();
        store.add("c1", "u2", "restock", MatchMode::Regex).await.unwrap();

        let watchers = store.channel_watchers("c1").await.unwrap().unwrap();
        assert_eq!(watchers.len(), 2);
        assert_eq!(watchers["u1"][0].word, "sale");
        assert_eq!(watchers["u2"][0].word, "restock");
    }

    #[tokio::test]
    async fn non_ascii_words_survive_the_file_verbatim() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .add("c1", "u1", "お知らせ", MatchMode::Partial)
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("お知らせ"), "expected verbatim UTF-8: {}", raw);
        // Pretty printed, not a single line
        assert!(raw.lines().count() > 1);

        let entries = store.list("c1", "u1").await.unwrap().unwrap();
        assert_eq!(entries[0].word, "お知らせ");
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error_not_a_reset() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.list("c1", "u1").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::WatchError::Store(StoreError::ParseFailed { .. })
        ));
    }
}
