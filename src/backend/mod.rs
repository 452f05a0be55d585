//! Backend: dispatch, adapters and lifecycle orchestration
//!
//! The [`Backend`] owns the model, the per-principal collection stores, the
//! compute correlation map and the adapter roles, and routes every invoked
//! action through the [`dispatch::DispatchTable`]. Resolution is pure; only
//! a successfully resolved operation reaches an adapter, so an unsupported
//! action never has side effects.

pub mod compute;
pub mod dispatch;
pub mod network;
pub mod provider;
pub mod storage;
pub mod templates;

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::delegation::QueueDelegate;
use crate::errors::{EngineError, EngineResult};
use crate::model::attributes::AttributeMap;
use crate::model::category::infrastructure::MSGLINK_ACTION_SCHEME;
use crate::model::category::{Action, Category, CategoryId, Mixin};
use crate::model::entity::{Link, Resource};
use crate::model::Model;
use crate::state_machine::compute::ComputeAction;
use crate::state_machine::network::NetworkAction;
use crate::state_machine::storage::StorageAction;
use crate::store::{CollectionStore, CorrelationMap, PrincipalStores};

use compute::{ComputeAdapter, ProviderCompute};
use dispatch::{ComputeOp, DispatchTable, MsgLinkOp, NetworkOp, Operation, Parameters, StorageOp};
use network::{LocalNetwork, NetworkAdapter};
use provider::IaasProvider;
use storage::{LocalStorage, StorageAdapter};

/// Mutable state shared with the adapter roles
pub struct EngineContext {
    pub model: Model,
    pub provider: Arc<dyn IaasProvider>,
    pub compute_ids: CorrelationMap,
    pub config: BackendConfig,
}

impl EngineContext {
    pub fn resource(&self, id: Uuid) -> EngineResult<&Resource> {
        self.model
            .graph()
            .find(id)
            .and_then(|e| e.as_resource())
            .ok_or_else(|| EngineError::NotFound(format!("resource {id}")))
    }

    pub fn resource_mut(&mut self, id: Uuid) -> EngineResult<&mut Resource> {
        self.model
            .graph_mut()
            .find_mut(id)
            .and_then(|e| e.as_resource_mut())
            .ok_or_else(|| EngineError::NotFound(format!("resource {id}")))
    }
}

/// Drop the persisted copies of purged links
pub(crate) fn persist_link_removals(store: &CollectionStore, links: &[Link]) -> EngineResult<()> {
    if links.is_empty() {
        return Ok(());
    }
    store.transaction(|collections| {
        for link in links {
            collections.remove_link(link.id);
        }
        Ok(())
    })
}

/// Grow a link's action list with the actions its Mixins contribute
fn union_mixin_actions(model: &Model, link: &mut Link) {
    for mixin_id in &link.mixins {
        let Ok(category) = model.registry().get(mixin_id) else {
            continue;
        };
        if let Some(mixin) = category.as_mixin() {
            for action in &mixin.actions {
                if !link.actions.contains(action) {
                    link.actions.push(action.clone());
                }
            }
        }
    }
}

pub struct Backend {
    ctx: EngineContext,
    table: DispatchTable,
    stores: PrincipalStores,
    compute: ProviderCompute,
    network: LocalNetwork,
    storage: LocalStorage,
    delegate: Option<QueueDelegate>,
}

impl Backend {
    pub fn new(
        config: BackendConfig,
        provider: Arc<dyn IaasProvider>,
        delegate: Option<QueueDelegate>,
    ) -> EngineResult<Self> {
        let compute_ids = CorrelationMap::open(&config.data_dir, "compute")?;
        let stores = PrincipalStores::new(config.data_dir.clone());
        let ctx = EngineContext {
            model: Model::with_infrastructure(),
            provider,
            compute_ids,
            config,
        };
        Ok(Self {
            ctx,
            table: DispatchTable::infrastructure(),
            stores,
            compute: ProviderCompute::new(),
            network: LocalNetwork::new(),
            storage: LocalStorage::new(),
            delegate,
        })
    }

    pub fn model(&self) -> &Model {
        &self.ctx.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.ctx.model
    }

    pub fn config(&self) -> &BackendConfig {
        &self.ctx.config
    }

    pub fn store_for(&self, principal: &str) -> EngineResult<Arc<CollectionStore>> {
        self.stores.store_for(principal)
    }

    /// Discover provider templates and admit every live instance
    ///
    /// Runs once at startup, before any principal is prepared, so persisted
    /// links replayed later find their source Resources in the graph.
    pub async fn initialize(&mut self) -> EngineResult<()> {
        templates::register_os_templates(&mut self.ctx).await?;
        templates::register_resource_templates(&mut self.ctx).await?;
        self.compute.reconcile(&mut self.ctx).await?;
        Ok(())
    }

    /// Replay a principal's persisted collections into the live model
    ///
    /// Actions and Mixins re-enter the registry before any link is touched;
    /// links then re-attach to their source Resources. A link whose source
    /// no longer resolves is stale: it is discarded and its persisted copy
    /// dropped in the same pass.
    pub fn prepare_principal(&mut self, principal: &str) -> EngineResult<()> {
        let store = self.stores.store_for(principal)?;
        let snapshot = store.read_only(|collections| collections.clone())?;

        for action in snapshot.actions {
            self.ctx.model.register(Category::Action(action))?;
        }
        for mixin in snapshot.mixins {
            self.ctx.model.register(Category::Mixin(mixin))?;
        }

        let mut stale = Vec::new();
        for mut link in snapshot.links {
            union_mixin_actions(&self.ctx.model, &mut link);
            let link_id = link.id;
            if self.ctx.model.attach_link(link).is_err() {
                stale.push(link_id);
            }
        }
        if !stale.is_empty() {
            warn!(
                principal,
                count = stale.len(),
                "discarding persisted links with missing sources"
            );
            store.transaction(|collections| {
                for id in &stale {
                    collections.remove_link(*id);
                }
                Ok(())
            })?;
        }
        info!(principal, "prepared principal collections");
        Ok(())
    }

    /// Register a Mixin and the Actions it contributes, durably
    ///
    /// The given actions become the Mixin's action list; both are persisted
    /// for the principal so they survive a restart.
    pub fn register_mixin(
        &mut self,
        principal: &str,
        mut mixin: Mixin,
        actions: Vec<Action>,
    ) -> EngineResult<()> {
        let store = self.stores.store_for(principal)?;
        mixin.actions = actions.iter().map(Action::type_identifier).collect();

        for action in &actions {
            self.ctx.model.register(Category::Action(action.clone()))?;
        }
        self.ctx.model.register(Category::Mixin(mixin.clone()))?;

        store.transaction(|collections| {
            for action in actions {
                collections.upsert_action(action);
            }
            collections.upsert_mixin(mixin);
            Ok(())
        })
    }

    /// Unregister a Mixin and its contributed Actions
    ///
    /// Fails with `CategoryInUse` while any entity still references the
    /// Mixin or one of its actions; nothing is removed in that case, in
    /// memory or on disk.
    pub fn unregister_mixin(&mut self, principal: &str, id: &CategoryId) -> EngineResult<()> {
        let store = self.stores.store_for(principal)?;
        let removed = self.ctx.model.unregister(id)?;
        store.transaction(|collections| {
            for category in &removed {
                match category {
                    Category::Mixin(m) => collections.remove_mixin(&m.type_identifier()),
                    Category::Action(a) => collections.remove_action(&a.type_identifier()),
                    Category::Kind(_) => {}
                }
            }
            Ok(())
        })
    }

    /// Register a standalone Action, durably
    pub fn register_action(&mut self, principal: &str, action: Action) -> EngineResult<()> {
        let store = self.stores.store_for(principal)?;
        self.ctx.model.register(Category::Action(action.clone()))?;
        store.transaction(|collections| {
            collections.upsert_action(action);
            Ok(())
        })
    }

    /// Admit a new Resource and run its `deploy` operation
    pub async fn deploy(
        &mut self,
        principal: &str,
        kind: CategoryId,
        mixins: BTreeSet<CategoryId>,
        attributes: AttributeMap,
        parameters: &Parameters,
    ) -> EngineResult<Uuid> {
        let id = self.ctx.model.admit(kind, mixins, attributes)?;
        self.dispatch(principal, id, "deploy", parameters).await?;
        Ok(id)
    }

    /// Attach a new link to its source Resource and persist it
    ///
    /// The link's type must carry a bound `link` operation; otherwise this
    /// fails with `ActionNotSupported` and nothing is attached.
    pub fn attach_link(&mut self, principal: &str, mut link: Link) -> EngineResult<()> {
        let op = self.table.resolve(&link.kind, &link.mixins, "link")?;
        debug!(link = %link.id, ?op, "attaching link");

        let store = self.stores.store_for(principal)?;
        union_mixin_actions(&self.ctx.model, &mut link);
        self.ctx.model.attach_link(link.clone())?;
        store.transaction(|collections| {
            collections.upsert_link(link);
            Ok(())
        })
    }

    /// Resolve and run an action against an admitted entity
    ///
    /// `action` is the plain term, e.g. `"start"`, `"resize"`, `"delete"`.
    pub async fn dispatch(
        &mut self,
        principal: &str,
        entity_id: Uuid,
        action: &str,
        parameters: &Parameters,
    ) -> EngineResult<()> {
        let (kind, mixins) = if let Some(entity) = self.ctx.model.graph().find(entity_id) {
            (entity.kind().clone(), entity.mixins().clone())
        } else if let Some(link) = self.ctx.model.graph().find_link(entity_id) {
            (link.kind.clone(), link.mixins.clone())
        } else {
            return Err(EngineError::NotFound(format!("entity {entity_id}")));
        };

        let op = self.table.resolve(&kind, &mixins, action)?;
        debug!(%entity_id, action, ?op, "dispatching operation");
        let store = self.stores.store_for(principal)?;
        self.run(&store, entity_id, op, parameters).await
    }

    async fn run(
        &mut self,
        store: &CollectionStore,
        id: Uuid,
        op: Operation,
        parameters: &Parameters,
    ) -> EngineResult<()> {
        match op {
            Operation::Compute(op) => match op {
                ComputeOp::Deploy => self.compute.deploy(&mut self.ctx, store, id, parameters).await,
                ComputeOp::UpdateState => self.update_state(id),
                ComputeOp::Delete => self.compute.delete(&mut self.ctx, store, id).await,
                ComputeOp::Start => {
                    self.compute
                        .run_action(&mut self.ctx, store, id, ComputeAction::Start)
                        .await
                }
                ComputeOp::Stop => {
                    self.compute
                        .run_action(&mut self.ctx, store, id, ComputeAction::Stop)
                        .await
                }
                ComputeOp::Restart => {
                    self.compute
                        .run_action(&mut self.ctx, store, id, ComputeAction::Restart)
                        .await
                }
                ComputeOp::Suspend => {
                    self.compute
                        .run_action(&mut self.ctx, store, id, ComputeAction::Suspend)
                        .await
                }
            },
            Operation::Network(op) => match op {
                NetworkOp::Deploy => self.network.deploy(&mut self.ctx, store, id).await,
                NetworkOp::UpdateState => self.update_state(id),
                NetworkOp::Delete => self.network.delete(&mut self.ctx, store, id).await,
                NetworkOp::Up => {
                    self.network
                        .run_action(&mut self.ctx, store, id, NetworkAction::Up)
                        .await
                }
                NetworkOp::Down => {
                    self.network
                        .run_action(&mut self.ctx, store, id, NetworkAction::Down)
                        .await
                }
            },
            Operation::Storage(op) => {
                let action = match op {
                    StorageOp::Deploy => return self.storage.deploy(&mut self.ctx, store, id).await,
                    StorageOp::UpdateState => return self.update_state(id),
                    StorageOp::Delete => return self.storage.delete(&mut self.ctx, store, id).await,
                    StorageOp::Online => StorageAction::Online,
                    StorageOp::Offline => StorageAction::Offline,
                    StorageOp::Backup => StorageAction::Backup,
                    StorageOp::Snapshot => StorageAction::Snapshot,
                    StorageOp::Resize => StorageAction::Resize,
                };
                self.storage
                    .run_action(&mut self.ctx, store, id, action, parameters)
                    .await
            }
            Operation::MsgLink(op) => match op {
                MsgLinkOp::Link => {
                    // The link already sits on its source; refresh its
                    // persisted copy.
                    let link = self
                        .ctx
                        .model
                        .graph()
                        .find_link(id)
                        .cloned()
                        .ok_or_else(|| EngineError::NotFound(format!("link {id}")))?;
                    store.transaction(|collections| {
                        collections.upsert_link(link);
                        Ok(())
                    })
                }
                MsgLinkOp::Delete => {
                    self.ctx.model.detach_link(id)?;
                    store.transaction(|collections| {
                        collections.remove_link(id);
                        Ok(())
                    })
                }
                MsgLinkOp::Call => self.msglink_call(id, parameters).await,
            },
        }
    }

    /// Entity state is already authoritative; a refresh has nothing to do
    fn update_state(&self, id: Uuid) -> EngineResult<()> {
        debug!(%id, "state refresh requested, nothing to observe");
        Ok(())
    }

    /// Forward a message-link call to its remote consumer
    async fn msglink_call(&self, id: Uuid, parameters: &Parameters) -> EngineResult<()> {
        let link = self
            .ctx
            .model
            .graph()
            .find_link(id)
            .ok_or_else(|| EngineError::NotFound(format!("link {id}")))?;
        let queue = link
            .attributes
            .get_str("occi.msglink.queue")
            .ok_or_else(|| EngineError::MissingParameter("occi.msglink.queue".to_string()))?
            .to_string();

        let action_id = CategoryId::new(MSGLINK_ACTION_SCHEME, "call");
        let action = self
            .ctx
            .model
            .registry()
            .get(&action_id)
            .ok()
            .and_then(|c| c.as_action())
            .cloned()
            .unwrap_or_else(|| Action::new(MSGLINK_ACTION_SCHEME, "call", "Call message link"));

        let base = self
            .ctx
            .model
            .registry()
            .get(&link.kind)
            .ok()
            .and_then(|c| c.as_kind())
            .map(|k| k.location.clone())
            .unwrap_or_else(|| "/link/".to_string());
        let location = format!("{base}{id}");

        let delegate = self
            .delegate
            .as_ref()
            .ok_or(EngineError::NoDelegateConfigured)?;
        delegate.delegate(&queue, &location, &action, parameters).await
    }
}
