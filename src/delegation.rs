//! Remote action delegation
//!
//! Forwards an action invocation to a remote queue consumer instead of
//! executing it locally. The envelope carries a location-plus-query string
//! encoding the action and its parameters (minus the transport-reserved
//! keys), an OCCI content-type marker and the routing key; the payload is
//! the serialized target action. Fire-and-forget: a failed publish is
//! reported, never retried, and no response is awaited.

use async_nats::{Client, ConnectOptions, HeaderMap};
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::dispatch::Parameters;
use crate::errors::{EngineError, EngineResult};
use crate::model::category::Action;

/// Keys consumed by the transport itself, never forwarded
const RESERVED_KEYS: [&str; 2] = ["action", "method"];

pub const OCCI_CONTENT_TYPE: &str = "application/occi+json";

/// Configuration for the delegate connection
#[derive(Debug, Clone)]
pub struct DelegateConfig {
    /// Queue server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "occi-engine".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Queue publisher handed to the engine at construction
#[derive(Clone)]
pub struct QueueDelegate {
    client: Client,
}

impl QueueDelegate {
    /// Connect a new delegate with the given configuration
    pub async fn connect(config: DelegateConfig) -> EngineResult<Self> {
        let options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout);
        let client = async_nats::connect_with_options(config.servers.join(","), options)
            .await
            .map_err(|e| EngineError::Publish(e.to_string()))?;
        info!("connected delegate to queue at {:?}", config.servers);
        Ok(Self { client })
    }

    /// Wrap an existing client connection
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Publish one action invocation to `queue_key`
    pub async fn delegate(
        &self,
        queue_key: &str,
        location: &str,
        action: &Action,
        parameters: &Parameters,
    ) -> EngineResult<()> {
        let path = encode_path(location, &action.category.term, parameters);

        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", OCCI_CONTENT_TYPE);
        headers.insert("Path-Info", path.as_str());

        let payload = serde_json::to_vec(&serde_json::json!({ "actions": [action] }))?;

        self.client
            .publish_with_headers(queue_key.to_string(), headers, payload.into())
            .await
            .map_err(|e| EngineError::Publish(e.to_string()))?;

        debug!(queue_key, path, "delegated action to remote consumer");
        Ok(())
    }
}

/// Encode the forwarded invocation as `location?action=term&k=v...`
///
/// Every parameter except the transport-reserved keys is carried; BTreeMap
/// iteration keeps the query order stable.
pub fn encode_path(location: &str, action_term: &str, parameters: &Parameters) -> String {
    let mut path = format!("{location}?action={action_term}");
    for (key, value) in parameters {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        path.push('&');
        path.push_str(key);
        path.push('=');
        path.push_str(value);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_path_excludes_reserved_keys() {
        let mut params = Parameters::new();
        params.insert("action".to_string(), "stop".to_string());
        params.insert("method".to_string(), "post".to_string());
        params.insert("size".to_string(), "50".to_string());
        params.insert("label".to_string(), "batch".to_string());

        let path = encode_path("/compute/abc", "stop", &params);
        assert_eq!(path, "/compute/abc?action=stop&label=batch&size=50");
    }

    #[test]
    fn test_encode_path_without_parameters() {
        assert_eq!(
            encode_path("/storage/xyz", "backup", &Parameters::new()),
            "/storage/xyz?action=backup"
        );
    }
}
