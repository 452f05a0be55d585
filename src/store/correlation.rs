//! Stable-identifier ↔ provider-native-identifier correlation
//!
//! One transactional map per backend family (e.g. "compute"). When an
//! existing provider object is observed without a recorded stable
//! identifier, one is minted and persisted; otherwise the recorded one is
//! reused so entity identity survives backend restarts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CorrelationState {
    /// native id → stable id
    by_native: HashMap<String, Uuid>,
}

#[derive(Debug)]
pub struct CorrelationMap {
    path: PathBuf,
    state: Mutex<CorrelationState>,
}

impl CorrelationMap {
    /// Open (or create) the correlation map for a backend family
    pub fn open(dir: &Path, family: &str) -> EngineResult<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{family}_correlation.json"));
        let state = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            CorrelationState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> EngineResult<std::sync::MutexGuard<'_, CorrelationState>> {
        self.state
            .lock()
            .map_err(|_| EngineError::Store("correlation map lock poisoned".to_string()))
    }

    /// Record a stable↔native pair; idempotent and overwrite-safe
    pub fn record(&self, stable: Uuid, native: &str) -> EngineResult<()> {
        let mut guard = self.lock()?;
        guard.by_native.insert(native.to_string(), stable);
        self.flush(&guard)
    }

    /// The stable identifier previously recorded for a native one
    pub fn stable_for(&self, native: &str) -> EngineResult<Option<Uuid>> {
        Ok(self.lock()?.by_native.get(native).copied())
    }

    /// Reuse the recorded stable identifier or mint and persist a new one
    ///
    /// Returns the stable id and whether it was freshly minted.
    pub fn resolve_or_mint(&self, native: &str) -> EngineResult<(Uuid, bool)> {
        let mut guard = self.lock()?;
        if let Some(stable) = guard.by_native.get(native) {
            return Ok((*stable, false));
        }
        let stable = Uuid::now_v7();
        guard.by_native.insert(native.to_string(), stable);
        self.flush(&guard)?;
        debug!(%stable, native, "minted stable identifier for provider object");
        Ok((stable, true))
    }

    /// Drop the pair for a native identifier, e.g. after instance deletion
    pub fn forget_native(&self, native: &str) -> EngineResult<()> {
        let mut guard = self.lock()?;
        guard.by_native.remove(native);
        self.flush(&guard)
    }

    /// The native identifier recorded for a stable one, if any
    pub fn native_for(&self, stable: Uuid) -> EngineResult<Option<String>> {
        Ok(self
            .lock()?
            .by_native
            .iter()
            .find(|(_, s)| **s == stable)
            .map(|(n, _)| n.clone()))
    }

    fn flush(&self, state: &CorrelationState) -> EngineResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
