//! Compute adapter
//!
//! Deploys instances through the external provider, reconciles live
//! provider state into the entity graph at startup, and drives the compute
//! lifecycle machine for the action operations. Identity of an observed
//! instance is resolved through the correlation map first, then through the
//! `occi_attribute_occi.core.id` instance metadata a deploy leaves behind,
//! and only then minted fresh.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatch::Parameters;
use super::provider::{CreateOptions, ProviderFlavor, ProviderInstance};
use super::{persist_link_removals, EngineContext};
use crate::errors::{EngineError, EngineResult};
use crate::model::category::infrastructure::COMPUTE;
use crate::model::entity::Resource;
use crate::state_machine::compute::{ComputeAction, ComputeState};
use crate::state_machine::StateMachine;
use crate::store::CollectionStore;

/// Metadata key prefix under which entity attributes round-trip through the
/// provider.
pub const ATTRIBUTE_METADATA_PREFIX: &str = "occi_attribute_";

/// Capability interface of the compute role
#[async_trait]
pub trait ComputeAdapter: Send + Sync {
    /// Admit every live provider instance into the entity graph
    async fn reconcile(&self, ctx: &mut EngineContext) -> EngineResult<usize>;

    /// Create a provider instance for an admitted compute Resource
    async fn deploy(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
        parameters: &Parameters,
    ) -> EngineResult<()>;

    /// Delete the provider instance and remove the Resource
    async fn delete(&self, ctx: &mut EngineContext, store: &CollectionStore, id: Uuid)
        -> EngineResult<()>;

    /// Run a lifecycle action against an admitted compute Resource
    async fn run_action(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
        action: ComputeAction,
    ) -> EngineResult<()>;
}

/// Compute role bound to whatever `IaasProvider` the context carries
#[derive(Debug, Default)]
pub struct ProviderCompute;

impl ProviderCompute {
    pub fn new() -> Self {
        Self
    }

    fn observe(
        &self,
        ctx: &mut EngineContext,
        instance: &ProviderInstance,
        flavors: &HashMap<String, ProviderFlavor>,
    ) -> EngineResult<()> {
        let mut resource = Resource::new(COMPUTE.into());

        // Correlation map first, deploy-time metadata second, mint last.
        let recorded = ctx.compute_ids.stable_for(&instance.native_id)?;
        resource.id = match recorded {
            Some(stable) => stable,
            None => {
                let from_metadata = instance
                    .metadata
                    .get("occi_attribute_occi.core.id")
                    .and_then(|v| Uuid::parse_str(v).ok());
                let stable = from_metadata.unwrap_or_else(Uuid::now_v7);
                ctx.compute_ids.record(stable, &instance.native_id)?;
                stable
            }
        };

        resource
            .attributes
            .set("occi.core.id", resource.id.to_string())?;
        resource
            .attributes
            .set("occi.core.title", instance.name.clone())?;
        if let Some(flavor) = flavors.get(&instance.flavor_id) {
            resource.attributes.set("occi.compute.cores", flavor.vcpus)?;
            resource.attributes.set("occi.compute.memory", flavor.ram_mb)?;
        }

        // Attributes the deploy round-tripped through instance metadata.
        for (key, value) in &instance.metadata {
            if let Some(path) = key.strip_prefix(ATTRIBUTE_METADATA_PREFIX) {
                if resource.attributes.set(path, value.clone()).is_err() {
                    warn!(key, "skipping metadata with invalid attribute path");
                }
            }
        }

        let (state, legal) = ComputeState::from_provider(&instance.state);
        debug!(native_id = %instance.native_id, provider_state = %instance.state,
            state = %state, "observed provider instance");
        resource
            .attributes
            .set("occi.compute.state", state.as_str())?;
        resource.actions = legal.iter().map(ComputeAction::category_id).collect();

        ctx.model.admit_resource(resource)
    }
}

#[async_trait]
impl ComputeAdapter for ProviderCompute {
    async fn reconcile(&self, ctx: &mut EngineContext) -> EngineResult<usize> {
        let provider = ctx.provider.clone();
        let instances = provider.list_instances().await?;
        let flavors: HashMap<String, ProviderFlavor> = provider
            .list_flavors()
            .await?
            .into_iter()
            .map(|f| (f.native_id.clone(), f))
            .collect();

        for instance in &instances {
            self.observe(ctx, instance, &flavors)?;
        }
        info!(count = instances.len(), "reconciled provider instances");
        Ok(instances.len())
    }

    async fn deploy(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
        parameters: &Parameters,
    ) -> EngineResult<()> {
        let (title, image_ref, flavor_ref) = {
            let resource = ctx.resource(id)?;
            let title = resource
                .title()
                .ok_or_else(|| EngineError::MissingParameter("occi.core.title".to_string()))?
                .to_string();
            let image = parameters
                .get("image")
                .cloned()
                .or_else(|| ctx.config.default_image.clone())
                .ok_or_else(|| EngineError::MissingParameter("image".to_string()))?;
            let flavor = parameters
                .get("flavor")
                .cloned()
                .or_else(|| ctx.config.default_flavor.clone())
                .ok_or_else(|| EngineError::MissingParameter("flavor".to_string()))?;
            (title, image, flavor)
        };

        // Tag the instance so a later observation can re-associate it even
        // without the correlation map.
        let mut options = CreateOptions::default();
        options.metadata.insert(
            format!("{ATTRIBUTE_METADATA_PREFIX}occi.core.id"),
            id.to_string(),
        );

        let provider = ctx.provider.clone();
        let instance = provider
            .create_instance(&title, &image_ref, &flavor_ref, options)
            .await?;
        ctx.compute_ids.record(id, &instance.native_id)?;
        info!(%id, native_id = %instance.native_id, "deployed compute instance");

        self.run_action(ctx, store, id, ComputeAction::Start).await
    }

    async fn delete(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
    ) -> EngineResult<()> {
        if let Some(native_id) = ctx.compute_ids.native_for(id)? {
            let provider = ctx.provider.clone();
            provider.delete_instance(&native_id).await?;
            ctx.compute_ids.forget_native(&native_id)?;
        }
        let (_, purged) = ctx.model.remove(id)?;
        persist_link_removals(store, &purged)?;
        info!(%id, "deleted compute resource");
        Ok(())
    }

    async fn run_action(
        &self,
        ctx: &mut EngineContext,
        store: &CollectionStore,
        id: Uuid,
        action: ComputeAction,
    ) -> EngineResult<()> {
        let resource = ctx.resource_mut(id)?;
        let current = resource
            .attributes
            .get_str("occi.compute.state")
            .and_then(ComputeState::from_str)
            .unwrap_or(ComputeState::Inactive);
        let (next, legal) =
            current
                .transition(&action)
                .map_err(|_| EngineError::ActionNotSupported {
                    type_identifier: COMPUTE.to_string(),
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
            .set("occi.compute.state", next.as_str())?;
        resource.actions = legal.iter().map(ComputeAction::category_id).collect();
        resource.updated_at = chrono::Utc::now();
        debug!(%id, action = %action, state = %next, "applied compute transition");
        Ok(())
    }
}
