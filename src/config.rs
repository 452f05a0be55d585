//! Backend configuration
//!
//! Captured once at backend construction and treated as immutable input;
//! loading this from YAML or elsewhere is the caller's concern.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Active provider name, e.g. "openstack"
    pub provider: String,
    /// Provider API endpoint
    pub endpoint: String,
    pub tenant: Option<String>,
    pub user: Option<String>,
    pub api_key: Option<String>,
    /// Image reference used when a deploy names none
    pub default_image: Option<String>,
    /// Flavor reference used when a deploy names none
    pub default_flavor: Option<String>,
    /// Scheme under which provider template mixins are registered,
    /// without a trailing slash
    pub scheme: String,
    /// Directory for the collection stores and correlation maps
    pub data_dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "openstack".to_string(),
            endpoint: "http://localhost:5000/v2.0".to_string(),
            tenant: None,
            user: None,
            api_key: None,
            default_image: None,
            default_flavor: None,
            scheme: "http://my.occi.service".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl BackendConfig {
    /// Normalize the scheme: no trailing slash, ever
    pub fn scheme(&self) -> &str {
        self.scheme.trim_end_matches('/')
    }
}
