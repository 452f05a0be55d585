//! Network adapter
//!
//! Networks are modeled locally and never touch the external provider. A
//! deploy brings the network up, `up`/`down` drive the symmetric lifecycle
//! machine, and state refresh is a no-op because there is nothing remote to
//! observe.

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{persist_link_removals, EngineContext};
use crate::errors::{EngineError, EngineResult};
use crate::model::category::infrastructure::NETWORK;
use crate::state_machine::network::{NetworkAction, NetworkState};
use crate::state_machine::StateMachine;
use crate::store::CollectionStore;

#[async_trait]
pub trait NetworkAdapter: Send + Sync {
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
        action: NetworkAction,
    ) -> EngineResult<()>;
}

#[derive(Debug, Default)]
pub struct LocalNetwork;

impl LocalNetwork {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NetworkAdapter for LocalNetwork {
    async fn deploy(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
    ) -> EngineResult<()> {
        info!(%id, "deploying local network");
        self.run_action(ctx, store, id, NetworkAction::Up).await
    }

    async fn delete(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
    ) -> EngineResult<()> {
        let (_, purged) = ctx.model.remove(id)?;
        persist_link_removals(store, &purged)?;
        info!(%id, "deleted network resource");
        Ok(())
    }

    async fn run_action(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
        action: NetworkAction,
    ) -> EngineResult<()> {
        let resource = ctx.resource_mut(id)?;
        let current = resource
            .attributes
            .get_str("occi.network.state")
            .and_then(NetworkState::from_str)
            .unwrap_or(NetworkState::Down);
        let (next, legal) =
            current
                .transition(&action)
                .map_err(|_| EngineError::ActionNotSupported {
                    type_identifier: NETWORK.to_string(),
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
            .set("occi.network.state", next.as_str())?;
        resource.actions = legal.iter().map(NetworkAction::category_id).collect();
        resource.updated_at = chrono::Utc::now();
        debug!(%id, action = action.term(), state = %next, "applied network transition");
        Ok(())
    }
}
