//! Built-in OCCI core + infrastructure categories
//!
//! The reference model the engine always carries: the core entity kinds,
//! the compute/network/storage infrastructure kinds with their lifecycle
//! actions, the `os_tpl`/`resource_tpl` template bases and the messaging
//! link mixin. Provider-specific templates layer on top of these at
//! reconciliation time.

use super::attributes::{AttributeDef, AttributeSchema};
use super::category::infrastructure::*;
use super::category::{Action, Category, CategoryId, Kind, Mixin};
use super::Model;
use crate::errors::EngineResult;

fn action(scheme: &str, term: &str, title: &str) -> Action {
    Action::new(scheme, term, title)
}

/// Register the full built-in model into `model`
pub fn register(model: &mut Model) -> EngineResult<()> {
    // Core kinds.
    let entity = Kind::new(CORE_SCHEME, "entity", "Entity");
    let entity_id = entity.type_identifier();
    model.register(Category::Kind(entity))?;

    let mut resource = Kind::new(CORE_SCHEME, "resource", "Resource");
    resource.related.push(entity_id.clone());
    resource.attributes = AttributeSchema::new()
        .with("occi.core.id", AttributeDef::default())
        .with("occi.core.title", AttributeDef::required())
        .with("occi.core.summary", AttributeDef::default());
    let resource_id = resource.type_identifier();
    model.register(Category::Kind(resource))?;

    let mut link = Kind::new(CORE_SCHEME, "link", "Link");
    link.related.push(entity_id);
    link.attributes = AttributeSchema::new()
        .with("occi.core.source", AttributeDef::default())
        .with("occi.core.target", AttributeDef::default());
    let link_id = link.type_identifier();
    model.register(Category::Kind(link))?;

    // Compute actions and kind.
    for (term, title) in [
        ("start", "Start Compute"),
        ("stop", "Stop Compute"),
        ("restart", "Restart Compute"),
        ("suspend", "Suspend Compute"),
    ] {
        model.register(Category::Action(action(COMPUTE_ACTION_SCHEME, term, title)))?;
    }
    let mut compute = Kind::new(INFRA_SCHEME, "compute", "Compute Resource");
    compute.related.push(resource_id.clone());
    compute.attributes = AttributeSchema::new()
        .with("occi.core.title", AttributeDef::required())
        .with("occi.compute.architecture", AttributeDef::default().pattern("x86|x64"))
        .with("occi.compute.cores", AttributeDef::default())
        .with("occi.compute.memory", AttributeDef::default())
        .with("occi.compute.hostname", AttributeDef::default())
        .with(
            "occi.compute.state",
            AttributeDef::with_default("inactive")
                .pattern("inactive|active|suspended|error")
                .describe("Current lifecycle state of the instance"),
        );
    compute.actions = ["start", "stop", "restart", "suspend"]
        .iter()
        .map(|t| CategoryId::new(COMPUTE_ACTION_SCHEME, t))
        .collect();
    model.register(Category::Kind(compute))?;

    // Network actions and kind.
    for (term, title) in [("up", "Network Up"), ("down", "Network Down")] {
        model.register(Category::Action(action(NETWORK_ACTION_SCHEME, term, title)))?;
    }
    let mut network = Kind::new(INFRA_SCHEME, "network", "Network Resource");
    network.related.push(resource_id.clone());
    network.attributes = AttributeSchema::new()
        .with("occi.core.title", AttributeDef::required())
        .with("occi.network.vlan", AttributeDef::default())
        .with("occi.network.label", AttributeDef::default())
        .with(
            "occi.network.state",
            AttributeDef::with_default("down").pattern("up|down"),
        );
    network.actions = ["up", "down"]
        .iter()
        .map(|t| CategoryId::new(NETWORK_ACTION_SCHEME, t))
        .collect();
    model.register(Category::Kind(network))?;

    // Storage actions and kind.
    for (term, title) in [
        ("online", "Storage Online"),
        ("offline", "Storage Offline"),
        ("backup", "Backup Storage"),
        ("snapshot", "Snapshot Storage"),
    ] {
        model.register(Category::Action(action(STORAGE_ACTION_SCHEME, term, title)))?;
    }
    let mut resize = action(STORAGE_ACTION_SCHEME, "resize", "Resize Storage");
    resize.attributes = AttributeSchema::new().with("size", AttributeDef::required());
    model.register(Category::Action(resize))?;

    let mut storage = Kind::new(INFRA_SCHEME, "storage", "Storage Resource");
    storage.related.push(resource_id);
    storage.attributes = AttributeSchema::new()
        .with("occi.core.title", AttributeDef::required())
        .with("occi.storage.size", AttributeDef::default())
        .with(
            "occi.storage.state",
            AttributeDef::with_default("offline").pattern("online|offline"),
        );
    storage.actions = ["online", "offline", "backup", "snapshot", "resize"]
        .iter()
        .map(|t| CategoryId::new(STORAGE_ACTION_SCHEME, t))
        .collect();
    model.register(Category::Kind(storage))?;

    // Template mixin bases; provider templates relate to these.
    let mut os_tpl = Mixin::new(INFRA_SCHEME, "os_tpl", "Operating System Template");
    os_tpl.location = "/mixin/os_tpl/".to_string();
    model.register(Category::Mixin(os_tpl))?;
    let mut resource_tpl = Mixin::new(INFRA_SCHEME, "resource_tpl", "Resource Template");
    resource_tpl.location = "/mixin/resource_tpl/".to_string();
    model.register(Category::Mixin(resource_tpl))?;

    // Messaging link mixin: forwards actions to a remote queue consumer.
    model.register(Category::Action(action(
        MSGLINK_ACTION_SCHEME,
        "call",
        "Forward Action To Queue",
    )))?;
    let mut msglink = Mixin::new(INFRA_SCHEME, "msglink", "Messaging Link");
    msglink.related.push(link_id);
    msglink.attributes = AttributeSchema::new().with(
        "occi.msglink.queue",
        AttributeDef::required().describe("Routing key of the remote consumer"),
    );
    msglink.actions = vec![CategoryId::new(MSGLINK_ACTION_SCHEME, "call")];
    model.register(Category::Mixin(msglink))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_model_registers() {
        let model = Model::with_infrastructure();
        for id in [COMPUTE, NETWORK, STORAGE, OS_TPL, RESOURCE_TPL, MSGLINK] {
            assert!(model.registry().contains(&id.into()), "missing {id}");
        }
    }

    #[test]
    fn test_infrastructure_kinds_relate_to_resource() {
        let model = Model::with_infrastructure();
        for id in [COMPUTE, NETWORK, STORAGE] {
            assert!(model.registry().is_related(&id.into(), &RESOURCE.into()));
        }
        assert!(model
            .registry()
            .is_related(&MSGLINK.into(), &LINK.into()));
    }

    #[test]
    fn test_kind_actions_declared() {
        let model = Model::with_infrastructure();
        let compute = model
            .registry()
            .get(&COMPUTE.into())
            .unwrap()
            .as_kind()
            .unwrap()
            .clone();
        let terms: Vec<&str> = compute.actions.iter().map(|a| a.term()).collect();
        assert_eq!(terms, vec!["start", "stop", "restart", "suspend"]);
    }
}
