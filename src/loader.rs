//! Manifest loading from files, strings, and HTTP URLs.
//!
//! A manifest declares routers and resources as JSON:
//!
//! ```json
//! {
//!   "routers": [{ "path": "api", "query": { "include": { "enabled": true } } }],
//!   "resources": [
//!     { "name": "Book", "schema": { "name": "data", "author": "to_one" } },
//!     { "name": "Author", "schema": { "name": "data" } }
//!   ]
//! }
//! ```
//!
//! Every document is checked against [`manifest_schema`] before it is
//! deserialized, so structural problems are reported with JSON Pointer paths.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::api::Api;
use crate::attribute::SchemaSpec;
use crate::config::{LinkOptions, QueryOptions, Settings};
use crate::error::{LoadError, ManifestError};
use crate::registry::ResourceOptions;
use crate::router::Router;
use crate::types::DEFAULT_ROUTER;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn default_mount() -> Vec<String> {
    vec![DEFAULT_ROUTER.to_string()]
}

/// Router declaration with its defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterManifest {
    pub path: String,
    #[serde(default)]
    pub query: QueryOptions,
    #[serde(default)]
    pub links: LinkOptions,
}

/// Resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceManifest {
    pub name: String,
    /// Router paths to mount on; `["api"]` when omitted.
    #[serde(default = "default_mount")]
    pub mount: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub schema: Map<String, Value>,
    #[serde(default)]
    pub query: QueryOptions,
    #[serde(default)]
    pub links: LinkOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub routers: Vec<RouterManifest>,
    #[serde(default)]
    pub resources: Vec<ResourceManifest>,
}

impl Manifest {
    /// Register every router and resource, then build all routers.
    ///
    /// # Errors
    ///
    /// The first `ConfigError` raised while defining, mounting or building.
    pub fn build_api(&self) -> Result<Api, LoadError> {
        let mut api = Api::new();
        for decl in &self.routers {
            let mut router = Router::new(&decl.path);
            *router.settings_mut() = Settings {
                query: decl.query.clone(),
                links: decl.links.clone(),
            };
            api.add_router(router)?;
        }

        for decl in &self.resources {
            let schema = SchemaSpec::from_map(&decl.name, &decl.schema)?;
            let options = ResourceOptions {
                version: decl.version.clone(),
                controller: None,
                settings: Settings {
                    query: decl.query.clone(),
                    links: decl.links.clone(),
                },
            };
            let id = api.define(&decl.name, schema, options)?;
            for path in &decl.mount {
                api.mount(path, id)?;
            }
        }

        api.build()?;
        debug!(
            routers = api.routers().len(),
            resources = api.registry().len(),
            "Built api from manifest"
        );
        Ok(api)
    }
}

/// JSON Schema every manifest must satisfy.
pub fn manifest_schema() -> Value {
    let query = json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "include": {
                "type": "object",
                "additionalProperties": false,
                "required": ["enabled"],
                "properties": {
                    "enabled": { "type": "boolean" },
                    "nesting_limit": { "type": "integer", "minimum": 0 }
                }
            },
            "sort": { "type": "boolean" },
            "page": { "type": "boolean" },
            "filter": { "type": "boolean" },
            "fields": { "type": "boolean" }
        }
    });
    let links = json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "url_format": { "enum": ["dashed", "camelCase", "underscored"] },
            "self_links": { "type": "boolean" },
            "relation_links": { "type": "boolean" },
            "base_url": { "type": "string" }
        }
    });
    let field = json!({
        "oneOf": [
            { "type": "string" },
            {
                "type": "object",
                "required": ["kind"],
                "additionalProperties": false,
                "properties": {
                    "kind": { "type": "string" },
                    "as": { "type": "string", "minLength": 1 },
                    "default": {}
                }
            }
        ]
    });

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "routers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["path"],
                    "additionalProperties": false,
                    "properties": {
                        "path": { "type": "string" },
                        "query": query,
                        "links": links
                    }
                }
            },
            "resources": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name"],
                    "additionalProperties": false,
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "mount": { "type": "array", "items": { "type": "string" } },
                        "version": { "type": "string" },
                        "schema": { "type": "object", "additionalProperties": field },
                        "query": query,
                        "links": links
                    }
                }
            }
        }
    })
}

/// Check a raw document against [`manifest_schema`].
///
/// # Errors
///
/// `LoadError::InvalidManifest` listing every violation.
pub fn validate_manifest(value: &Value) -> Result<(), LoadError> {
    let schema = manifest_schema();
    let validator =
        jsonschema::validator_for(&schema).map_err(|e| LoadError::InvalidManifest {
            errors: vec![ManifestError {
                path: String::new(),
                message: e.to_string(),
            }],
        })?;

    let errors: Vec<ManifestError> = validator
        .iter_errors(value)
        .map(|e| ManifestError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LoadError::InvalidManifest { errors })
    }
}

/// Validate and deserialize a raw manifest document.
pub fn parse_manifest(value: Value) -> Result<Manifest, LoadError> {
    validate_manifest(&value)?;
    serde_json::from_value(value).map_err(|source| LoadError::InvalidJson { source })
}

/// Load the raw JSON of a manifest file without validating it.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a manifest from a file path.
pub fn load_manifest(path: &Path) -> Result<Manifest, LoadError> {
    parse_manifest(load_json(path)?)
}

/// Load a manifest from a JSON string.
pub fn load_manifest_str(content: &str) -> Result<Manifest, LoadError> {
    let value = serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    parse_manifest(value)
}

/// Fetch the raw JSON of a manifest over HTTP/HTTPS.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the server
/// answers with an error status.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Load a manifest from an HTTP/HTTPS URL.
#[cfg(feature = "remote")]
pub fn load_manifest_url(url: &str) -> Result<Manifest, LoadError> {
    parse_manifest(load_json_url(url)?)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load raw manifest JSON from a file path or URL.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

/// Load a manifest from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_manifest_auto(source: &str) -> Result<Manifest, LoadError> {
    parse_manifest(load_json_auto(source)?)
}
