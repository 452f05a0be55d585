//! External IaaS provider collaborator
//!
//! The one seam between this engine and the infrastructure cloud that
//! physically hosts resources. The engine never retries a failed provider
//! call; a provider failure is the handler's failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::EngineResult;

/// A provider-native compute instance as observed via the provider API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInstance {
    /// The provider's own volatile identifier
    pub native_id: String,
    pub name: String,
    /// Provider state string, mapped into the compute machine on intake
    pub state: String,
    pub flavor_id: String,
    pub image_id: String,
    /// Provider-side key/value metadata attached to the instance
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFlavor {
    pub native_id: String,
    pub name: String,
    pub vcpus: i64,
    pub ram_mb: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderImage {
    pub native_id: String,
    pub name: String,
}

/// Options for instance creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Metadata stored on the instance; `occi_attribute_`-prefixed keys
    /// round-trip back into the entity attribute map on observation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Contract this engine requires from the infrastructure cloud
#[async_trait]
pub trait IaasProvider: Send + Sync {
    async fn list_instances(&self) -> EngineResult<Vec<ProviderInstance>>;

    async fn create_instance(
        &self,
        name: &str,
        image_ref: &str,
        flavor_ref: &str,
        options: CreateOptions,
    ) -> EngineResult<ProviderInstance>;

    async fn delete_instance(&self, native_id: &str) -> EngineResult<()>;

    async fn list_flavors(&self) -> EngineResult<Vec<ProviderFlavor>>;

    async fn list_images(&self) -> EngineResult<Vec<ProviderImage>>;
}
