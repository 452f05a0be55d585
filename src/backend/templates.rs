//! Template mixin discovery
//!
//! Provider images become `os_tpl` mixins and provider flavors become
//! `resource_tpl` mixins, registered under the configured authority scheme.
//! The native identifiers ride along as schema defaults so a deploy can find
//! its way back to the provider object.

use tracing::info;

use super::EngineContext;
use crate::errors::EngineResult;
use crate::model::attributes::AttributeDef;
use crate::model::category::infrastructure::{OS_TPL, RESOURCE_TPL};
use crate::model::category::{Category, Mixin};

/// Collapse a provider name into a category term
fn template_term(name: &str) -> String {
    let term: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if term.is_empty() {
        "unnamed".to_string()
    } else {
        term
    }
}

/// Register an `os_tpl` mixin per provider image
pub async fn register_os_templates(ctx: &mut EngineContext) -> EngineResult<usize> {
    let provider = ctx.provider.clone();
    let images = provider.list_images().await?;
    let scheme = format!("{}/occi/infrastructure/os_tpl#", ctx.config.scheme());

    for image in &images {
        let mut mixin = Mixin::new(&scheme, &template_term(&image.name), &image.name);
        mixin.related.push(OS_TPL.into());
        mixin.attributes.define(
            "occi.os_tpl.image_id",
            AttributeDef::with_default(image.native_id.clone()),
        )?;
        ctx.model.register(Category::Mixin(mixin))?;
    }
    info!(count = images.len(), "registered os template mixins");
    Ok(images.len())
}

/// Register a `resource_tpl` mixin per provider flavor
pub async fn register_resource_templates(ctx: &mut EngineContext) -> EngineResult<usize> {
    let provider = ctx.provider.clone();
    let flavors = provider.list_flavors().await?;
    let scheme = format!("{}/occi/infrastructure/resource_tpl#", ctx.config.scheme());

    for flavor in &flavors {
        let mut mixin = Mixin::new(&scheme, &template_term(&flavor.name), &flavor.name);
        mixin.related.push(RESOURCE_TPL.into());
        mixin.attributes.define(
            "occi.resource_tpl.flavor_id",
            AttributeDef::with_default(flavor.native_id.clone()),
        )?;
        mixin.attributes.define(
            "occi.resource_tpl.vcpus",
            AttributeDef::with_default(flavor.vcpus),
        )?;
        mixin.attributes.define(
            "occi.resource_tpl.memory",
            AttributeDef::with_default(flavor.ram_mb),
        )?;
        ctx.model.register(Category::Mixin(mixin))?;
    }
    info!(count = flavors.len(), "registered resource template mixins");
    Ok(flavors.len())
}
