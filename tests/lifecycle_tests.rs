//! End-to-end lifecycle tests through the dispatch table
//!
//! These tests drive the full flow: admit a resource, resolve its action
//! through the dispatch table, run the adapter, and observe the mutated
//! entity state and legal-action list.

mod common;

use std::collections::BTreeSet;
use uuid::Uuid;

use common::{test_config, MockProvider};
use occi_engine::backend::dispatch::Parameters;
use occi_engine::model::attributes::AttributeMap;
use occi_engine::model::category::infrastructure::{
    COMPUTE, COMPUTE_ACTION_SCHEME, NETWORK, NETWORK_ACTION_SCHEME, STORAGE,
};
use occi_engine::{Backend, CategoryId, EngineError};
use pretty_assertions::assert_eq;

const PRINCIPAL: &str = "alice";

async fn backend(provider: std::sync::Arc<MockProvider>, dir: &std::path::Path) -> Backend {
    common::init_tracing();
    Backend::new(test_config(dir), provider, None).unwrap()
}

fn titled(title: &str) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.set("occi.core.title", title).unwrap();
    attrs
}

fn state_of(backend: &Backend, id: Uuid, path: &str) -> String {
    backend
        .model()
        .graph()
        .find(id)
        .unwrap()
        .attributes()
        .get_str(path)
        .unwrap()
        .to_string()
}

fn actions_of(backend: &Backend, id: Uuid) -> Vec<CategoryId> {
    backend.model().graph().find(id).unwrap().actions().to_vec()
}

#[tokio::test]
async fn test_compute_deploy_creates_tagged_instance_and_starts() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider.clone(), dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            COMPUTE.into(),
            BTreeSet::new(),
            titled("vm1"),
            &Parameters::new(),
        )
        .await
        .unwrap();

    assert_eq!(provider.instance_count(), 1);
    let instance = provider.instance("srv-0").unwrap();
    // Deploy tags the instance so a later observation can re-associate it.
    assert_eq!(
        instance.metadata.get("occi_attribute_occi.core.id"),
        Some(&id.to_string())
    );

    assert_eq!(state_of(&backend, id, "occi.compute.state"), "active");
    let expected: Vec<CategoryId> = ["stop", "restart", "suspend"]
        .iter()
        .map(|t| CategoryId::new(COMPUTE_ACTION_SCHEME, t))
        .collect();
    assert_eq!(actions_of(&backend, id), expected);
}

#[tokio::test]
async fn test_compute_start_stop_cycle() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            COMPUTE.into(),
            BTreeSet::new(),
            titled("vm1"),
            &Parameters::new(),
        )
        .await
        .unwrap();

    backend
        .dispatch(PRINCIPAL, id, "stop", &Parameters::new())
        .await
        .unwrap();
    assert_eq!(state_of(&backend, id, "occi.compute.state"), "inactive");
    assert_eq!(
        actions_of(&backend, id),
        vec![CategoryId::new(COMPUTE_ACTION_SCHEME, "start")]
    );

    backend
        .dispatch(PRINCIPAL, id, "start", &Parameters::new())
        .await
        .unwrap();
    assert_eq!(state_of(&backend, id, "occi.compute.state"), "active");
}

#[tokio::test]
async fn test_compute_restart_from_stopped_ends_active() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            COMPUTE.into(),
            BTreeSet::new(),
            titled("vm1"),
            &Parameters::new(),
        )
        .await
        .unwrap();
    backend
        .dispatch(PRINCIPAL, id, "stop", &Parameters::new())
        .await
        .unwrap();

    backend
        .dispatch(PRINCIPAL, id, "restart", &Parameters::new())
        .await
        .unwrap();
    assert_eq!(state_of(&backend, id, "occi.compute.state"), "active");
}

#[tokio::test]
async fn test_compute_delete_removes_provider_instance() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider.clone(), dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            COMPUTE.into(),
            BTreeSet::new(),
            titled("vm1"),
            &Parameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(provider.instance_count(), 1);

    backend
        .dispatch(PRINCIPAL, id, "delete", &Parameters::new())
        .await
        .unwrap();
    assert_eq!(provider.instance_count(), 0);
    assert!(backend.model().graph().find(id).is_none());
}

#[tokio::test]
async fn test_network_lifecycle_never_touches_provider() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider.clone(), dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            NETWORK.into(),
            BTreeSet::new(),
            titled("net1"),
            &Parameters::new(),
        )
        .await
        .unwrap();

    assert_eq!(provider.instance_count(), 0);
    assert_eq!(state_of(&backend, id, "occi.network.state"), "up");
    assert_eq!(
        actions_of(&backend, id),
        vec![CategoryId::new(NETWORK_ACTION_SCHEME, "down")]
    );

    backend
        .dispatch(PRINCIPAL, id, "down", &Parameters::new())
        .await
        .unwrap();
    assert_eq!(state_of(&backend, id, "occi.network.state"), "down");
    assert_eq!(
        actions_of(&backend, id),
        vec![CategoryId::new(NETWORK_ACTION_SCHEME, "up")]
    );
}

#[tokio::test]
async fn test_storage_resize_requires_size_parameter() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            STORAGE.into(),
            BTreeSet::new(),
            titled("vol1"),
            &Parameters::new(),
        )
        .await
        .unwrap();

    let err = backend
        .dispatch(PRINCIPAL, id, "resize", &Parameters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingParameter(p) if p == "size"));
}

#[tokio::test]
async fn test_storage_resize_rewrites_size_only() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            STORAGE.into(),
            BTreeSet::new(),
            titled("vol1"),
            &Parameters::new(),
        )
        .await
        .unwrap();
    let state_before = state_of(&backend, id, "occi.storage.state");
    let actions_before = actions_of(&backend, id);

    let mut params = Parameters::new();
    params.insert("size".to_string(), "20".to_string());
    backend
        .dispatch(PRINCIPAL, id, "resize", &params)
        .await
        .unwrap();

    // State and the legal-action list survive a resize unchanged.
    assert_eq!(state_of(&backend, id, "occi.storage.state"), state_before);
    assert_eq!(actions_of(&backend, id), actions_before);
    let size = backend
        .model()
        .graph()
        .find(id)
        .unwrap()
        .attributes()
        .get("occi.storage.size")
        .and_then(|v| v.as_int())
        .unwrap();
    assert_eq!(size, 20);
}

#[tokio::test]
async fn test_unsupported_action_has_no_side_effects() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    let id = backend
        .deploy(
            PRINCIPAL,
            NETWORK.into(),
            BTreeSet::new(),
            titled("net1"),
            &Parameters::new(),
        )
        .await
        .unwrap();
    let state_before = state_of(&backend, id, "occi.network.state");

    let err = backend
        .dispatch(PRINCIPAL, id, "suspend", &Parameters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ActionNotSupported { .. }));
    assert_eq!(state_of(&backend, id, "occi.network.state"), state_before);
}

#[tokio::test]
async fn test_msglink_call_requires_a_delegate() {
    use occi_engine::model::category::infrastructure::{LINK, MSGLINK};
    use occi_engine::Link;

    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    let vm_id = backend
        .deploy(
            PRINCIPAL,
            COMPUTE.into(),
            BTreeSet::new(),
            titled("vm1"),
            &Parameters::new(),
        )
        .await
        .unwrap();
    let source = backend.model().entity_location(vm_id).unwrap();

    let mut link = Link::new(LINK.into(), MSGLINK.into(), source, "/queue/jobs".to_string());
    link.mixins.insert(MSGLINK.into());
    link.attributes.set("occi.msglink.queue", "jobs").unwrap();
    let link_id = link.id;
    backend.attach_link(PRINCIPAL, link).unwrap();

    let err = backend
        .dispatch(PRINCIPAL, link_id, "call", &Parameters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoDelegateConfigured));

    // Deleting the link detaches it and drops the persisted copy.
    backend
        .dispatch(PRINCIPAL, link_id, "delete", &Parameters::new())
        .await
        .unwrap();
    assert!(backend.model().graph().find_link(link_id).is_none());
    let store = backend.store_for(PRINCIPAL).unwrap();
    assert_eq!(store.read_only(|c| c.links.len()).unwrap(), 0);
}

#[tokio::test]
async fn test_initialize_reconciles_preexisting_instances() {
    let provider = MockProvider::new();
    provider.seed("pre-1", "legacy-vm", "active");
    provider.seed("pre-2", "parked-vm", "shutoff");
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    backend.initialize().await.unwrap();

    let resources: Vec<_> = backend.model().graph().resources().collect();
    assert_eq!(resources.len(), 2);

    let legacy = resources
        .iter()
        .find(|r| r.title() == Some("legacy-vm"))
        .unwrap();
    assert_eq!(
        legacy.attributes.get_str("occi.compute.state"),
        Some("active")
    );
    // Flavor f-1 contributes core/memory figures.
    assert_eq!(
        legacy.attributes.get("occi.compute.cores").and_then(|v| v.as_int()),
        Some(1)
    );
    assert_eq!(
        legacy
            .attributes
            .get("occi.compute.memory")
            .and_then(|v| v.as_int()),
        Some(2048)
    );

    let parked = resources
        .iter()
        .find(|r| r.title() == Some("parked-vm"))
        .unwrap();
    assert_eq!(
        parked.attributes.get_str("occi.compute.state"),
        Some("inactive")
    );
    assert_eq!(
        parked.actions,
        vec![CategoryId::new(COMPUTE_ACTION_SCHEME, "restart")]
    );
}

#[tokio::test]
async fn test_initialize_registers_template_mixins() {
    let provider = MockProvider::new();
    let dir = tempfile::tempdir().unwrap();
    let mut backend = backend(provider, dir.path()).await;

    backend.initialize().await.unwrap();

    let scheme = backend.config().scheme().to_string();
    let os_tpl = CategoryId::new(
        &format!("{scheme}/occi/infrastructure/os_tpl#"),
        "ubuntu_22_04",
    );
    let resource_tpl = CategoryId::new(
        &format!("{scheme}/occi/infrastructure/resource_tpl#"),
        "m1_small",
    );
    assert!(backend.model().registry().contains(&os_tpl));
    assert!(backend.model().registry().contains(&resource_tpl));
}
