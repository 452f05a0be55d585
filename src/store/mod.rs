//! Persistent collection store
//!
//! A per-principal transactional store holding three collections: `links`,
//! `mixins` and `actions`. All mutations inside one `transaction` call are
//! atomic: on success the new state is written to a temporary file and
//! renamed over the old one, on error both memory and disk stay exactly as
//! they were. Link attach/detach and the corresponding registry mutations
//! must never observably diverge, which is why the closure gets exclusive
//! read-modify-write access to all three collections at once.
//!
//! On process start `mixins` and `actions` are replayed into the type
//! registry before any entities are admitted; `links` are replayed into the
//! entity graph only after the provider has repopulated resources.

pub mod correlation;

pub use correlation::CorrelationMap;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::model::category::{Action, CategoryId, Mixin};
use crate::model::entity::Link;

/// The three persisted collections of one principal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub mixins: Vec<Mixin>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Collections {
    /// Replace-or-append by link identifier
    pub fn upsert_link(&mut self, link: Link) {
        self.links.retain(|l| l.id != link.id);
        self.links.push(link);
    }

    pub fn remove_link(&mut self, id: Uuid) {
        self.links.retain(|l| l.id != id);
    }

    /// Replace-or-append by type identifier
    pub fn upsert_mixin(&mut self, mixin: Mixin) {
        let id = mixin.type_identifier();
        self.mixins.retain(|m| m.type_identifier() != id);
        self.mixins.push(mixin);
    }

    pub fn remove_mixin(&mut self, id: &CategoryId) {
        self.mixins.retain(|m| &m.type_identifier() != id);
    }

    /// Replace-or-append by type identifier
    pub fn upsert_action(&mut self, action: Action) {
        let id = action.type_identifier();
        self.actions.retain(|a| a.type_identifier() != id);
        self.actions.push(action);
    }

    pub fn remove_action(&mut self, id: &CategoryId) {
        self.actions.retain(|a| &a.type_identifier() != id);
    }
}

/// Transactional file-backed store for one principal
#[derive(Debug)]
pub struct CollectionStore {
    path: PathBuf,
    state: Mutex<Collections>,
}

impl CollectionStore {
    /// Open (or create) the store file for a principal under `dir`
    pub fn open(dir: &Path, principal: &str) -> EngineResult<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", sanitize(principal)));
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            Collections::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> EngineResult<std::sync::MutexGuard<'_, Collections>> {
        self.state
            .lock()
            .map_err(|_| EngineError::Store("collection store lock poisoned".to_string()))
    }

    /// Exclusive read-modify-write access to all three collections
    ///
    /// All-or-nothing: if the closure errors, the in-memory state is rolled
    /// back and the file is untouched; if it succeeds, the new state is
    /// durably swapped in via write-then-rename.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Collections) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut guard = self.lock()?;
        let snapshot = guard.clone();
        match f(&mut guard) {
            Ok(value) => {
                self.flush(&guard)?;
                Ok(value)
            }
            Err(e) => {
                *guard = snapshot;
                Err(e)
            }
        }
    }

    /// Consistent snapshot read
    pub fn read_only<T>(&self, f: impl FnOnce(&Collections) -> T) -> EngineResult<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    fn flush(&self, state: &Collections) -> EngineResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "flushed collection store");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sanitize(principal: &str) -> String {
    principal
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Lazily opened stores, one per principal; cross-principal stores are
/// independent and may proceed fully in parallel.
#[derive(Debug, Default)]
pub struct PrincipalStores {
    dir: PathBuf,
    stores: Mutex<HashMap<String, Arc<CollectionStore>>>,
}

impl PrincipalStores {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn store_for(&self, principal: &str) -> EngineResult<Arc<CollectionStore>> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| EngineError::Store("principal store map lock poisoned".to_string()))?;
        if let Some(store) = stores.get(principal) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(CollectionStore::open(&self.dir, principal)?);
        stores.insert(principal.to_string(), Arc::clone(&store));
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::infrastructure::{LINK, NETWORK};
    use pretty_assertions::assert_eq;

    fn link() -> Link {
        Link::new(
            LINK.into(),
            NETWORK.into(),
            "/compute/a".to_string(),
            "/network/b".to_string(),
        )
    }

    #[test]
    fn test_transaction_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let l = link();
        {
            let store = CollectionStore::open(dir.path(), "alice").unwrap();
            store
                .transaction(|c| {
                    c.upsert_link(l.clone());
                    Ok(())
                })
                .unwrap();
        }
        let store = CollectionStore::open(dir.path(), "alice").unwrap();
        let links = store.read_only(|c| c.links.clone()).unwrap();
        assert_eq!(links, vec![l]);
    }

    #[test]
    fn test_failed_transaction_rolls_back_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), "alice").unwrap();
        store
            .transaction(|c| {
                c.upsert_link(link());
                Ok(())
            })
            .unwrap();
        let before = fs::read(store.path()).unwrap();

        let result: EngineResult<()> = store.transaction(|c| {
            c.links.clear();
            c.upsert_mixin(Mixin::new("http://x#", "m", "M"));
            Err(EngineError::Store("injected".to_string()))
        });
        assert!(result.is_err());

        assert_eq!(store.read_only(|c| c.links.len()).unwrap(), 1);
        assert_eq!(store.read_only(|c| c.mixins.len()).unwrap(), 0);
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_upserts_collapse_duplicates() {
        let mut c = Collections::default();
        let mixin = Mixin::new("http://x#", "m", "M");
        c.upsert_mixin(mixin.clone());
        c.upsert_mixin(mixin);
        assert_eq!(c.mixins.len(), 1);

        let l = link();
        c.upsert_link(l.clone());
        c.upsert_link(l.clone());
        assert_eq!(c.links.len(), 1);
        c.remove_link(l.id);
        assert!(c.links.is_empty());
    }

    #[test]
    fn test_principals_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let stores = PrincipalStores::new(dir.path());
        let alice = stores.store_for("alice").unwrap();
        let bob = stores.store_for("bob").unwrap();
        alice
            .transaction(|c| {
                c.upsert_link(link());
                Ok(())
            })
            .unwrap();
        assert_eq!(bob.read_only(|c| c.links.len()).unwrap(), 0);
        assert_ne!(alice.path(), bob.path());
    }
}
