//! Shared fixtures for the integration test suites
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use occi_engine::backend::provider::{
    CreateOptions, IaasProvider, ProviderFlavor, ProviderImage, ProviderInstance,
};
use occi_engine::{BackendConfig, EngineError, EngineResult};

/// In-memory provider double with inspectable instance state
#[derive(Default)]
pub struct MockProvider {
    pub instances: Mutex<Vec<ProviderInstance>>,
    counter: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an instance as if it pre-existed in the cloud
    pub fn seed(&self, native_id: &str, name: &str, state: &str) {
        self.instances.lock().unwrap().push(ProviderInstance {
            native_id: native_id.to_string(),
            name: name.to_string(),
            state: state.to_string(),
            flavor_id: "f-1".to_string(),
            image_id: "i-1".to_string(),
            metadata: HashMap::new(),
        });
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    pub fn instance(&self, native_id: &str) -> Option<ProviderInstance> {
        self.instances
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.native_id == native_id)
            .cloned()
    }
}

#[async_trait]
impl IaasProvider for MockProvider {
    async fn list_instances(&self) -> EngineResult<Vec<ProviderInstance>> {
        Ok(self.instances.lock().unwrap().clone())
    }

    async fn create_instance(
        &self,
        name: &str,
        image_ref: &str,
        flavor_ref: &str,
        options: CreateOptions,
    ) -> EngineResult<ProviderInstance> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let instance = ProviderInstance {
            native_id: format!("srv-{n}"),
            name: name.to_string(),
            state: "active".to_string(),
            flavor_id: flavor_ref.to_string(),
            image_id: image_ref.to_string(),
            metadata: options.metadata,
        };
        self.instances.lock().unwrap().push(instance.clone());
        Ok(instance)
    }

    async fn delete_instance(&self, native_id: &str) -> EngineResult<()> {
        let mut instances = self.instances.lock().unwrap();
        let before = instances.len();
        instances.retain(|i| i.native_id != native_id);
        if instances.len() == before {
            return Err(EngineError::Provider(format!(
                "no such instance {native_id}"
            )));
        }
        Ok(())
    }

    async fn list_flavors(&self) -> EngineResult<Vec<ProviderFlavor>> {
        Ok(vec![
            ProviderFlavor {
                native_id: "f-1".to_string(),
                name: "m1.small".to_string(),
                vcpus: 1,
                ram_mb: 2048,
            },
            ProviderFlavor {
                native_id: "f-2".to_string(),
                name: "m1.large".to_string(),
                vcpus: 4,
                ram_mb: 8192,
            },
        ])
    }

    async fn list_images(&self) -> EngineResult<Vec<ProviderImage>> {
        Ok(vec![ProviderImage {
            native_id: "i-1".to_string(),
            name: "Ubuntu 22.04".to_string(),
        }])
    }
}

/// Install the test log subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config rooted in a temporary data directory
pub fn test_config(dir: &std::path::Path) -> BackendConfig {
    BackendConfig {
        default_image: Some("i-1".to_string()),
        default_flavor: Some("f-1".to_string()),
        data_dir: dir.to_path_buf(),
        ..BackendConfig::default()
    }
}
