//! Storage adapter
//!
//! Volumes are local-only like networks. `online`/`offline` flip the
//! availability state, `backup` and `snapshot` keep state and legal actions
//! untouched, and `resize` requires a `size` parameter and rewrites only
//! `occi.storage.size`.

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::dispatch::Parameters;
use super::{persist_link_removals, EngineContext};
use crate::errors::{EngineError, EngineResult};
use crate::model::category::infrastructure::STORAGE;
use crate::state_machine::storage::{StorageAction, StorageState};
use crate::state_machine::StateMachine;
use crate::store::CollectionStore;

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn deploy(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
    ) -> EngineResult<()>;

    async fn delete(&self, ctx: &mut EngineContext, store: &CollectionStore, id: Uuid)
        -> EngineResult<()>;

    async fn run_action(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
        action: StorageAction,
        parameters: &Parameters,
    ) -> EngineResult<()>;
}

#[derive(Debug, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn deploy(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
    ) -> EngineResult<()> {
        info!(%id, "deploying local storage volume");
        self.run_action(ctx, store, id, StorageAction::Online, &Parameters::new())
            .await
    }

    async fn delete(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
    ) -> EngineResult<()> {
        let (_, purged) = ctx.model.remove(id)?;
        persist_link_removals(store, &purged)?;
        info!(%id, "deleted storage resource");
        Ok(())
    }

    async fn run_action(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
        action: StorageAction,
        parameters: &Parameters,
    ) -> EngineResult<()> {
        // Validate resize input before mutating anything.
        let new_size = match action {
            StorageAction::Resize => {
                let raw = parameters
                    .get("size")
                    .ok_or_else(|| EngineError::MissingParameter("size".to_string()))?;
                Some(raw.parse::<i64>().map_err(|_| EngineError::SchemaValidation {
                    attribute: "size".to_string(),
                    reason: format!("not an integer: {raw}"),
                })?)
            }
            _ => None,
        };

        let resource = ctx.resource_mut(id)?;
        let current = resource
            .attributes
            .get_str("occi.storage.state")
            .and_then(StorageState::from_str)
            .unwrap_or(StorageState::Offline);
        let (next, legal) =
            current
                .transition(&action)
                .map_err(|_| EngineError::ActionNotSupported {
                    type_identifier: STORAGE.to_string(),
                    action: action.term().to_string(),
                })?;

        let stripped: Vec<_> = resource
            .links
            .iter()
            .filter(|l| l.rel.as_str().contains("action"))
            .map(|l| l.id)
            .collect();
        // Persist first; the in-memory entity only changes once the store
        // has accepted the stripped-link removals.
        store.transaction(|collections| {
            for link_id in &stripped {
                collections.remove_link(*link_id);
            }
            Ok(())
        })?;
        resource.strip_action_links();
        resource
            .attributes
            .set("occi.storage.state", next.as_str())?;
        if let Some(size) = new_size {
            resource.attributes.set("occi.storage.size", size)?;
        }
        resource.actions = legal.iter().map(StorageAction::category_id).collect();
        resource.updated_at = chrono::Utc::now();
        debug!(%id, action = action.term(), state = %next, "applied storage transition");
        Ok(())
    }
}
