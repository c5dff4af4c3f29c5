//! Service manifest types.
//!
//! These types mirror the user-authored service YAML. Nearly every field is
//! optional so that services which never opted into caching still parse;
//! defaulting happens later, in [`crate::settings`]. Values of the wrong
//! shape are dropped with a warning instead of rejecting the manifest.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceManifest {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub custom: CustomConfig,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionDeclaration>,
}

impl ServiceManifest {
    /// Parse a manifest from YAML.
    pub fn from_yaml_str(contents: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// The caching block, if the service declares one.
    pub fn caching(&self) -> Option<&CachingConfig> {
        self.custom.api_gateway_caching.as_ref()
    }

    /// Rest API id configured on the provider, which may be a literal id or a
    /// template intrinsic such as `{"Fn::ImportValue": ...}`.
    pub fn predefined_rest_api_id(&self) -> Option<&serde_json::Value> {
        self.provider
            .api_gateway
            .as_ref()
            .and_then(|gw| gw.rest_api_id.as_ref())
            .filter(|id| !id.is_null())
    }

    /// Whether the deployment has a REST API at all: either a predefined one,
    /// or one created because some function has an HTTP event.
    pub fn rest_api_exists(&self) -> bool {
        if self.predefined_rest_api_id().is_some() {
            return true;
        }
        self.functions
            .values()
            .any(|function| function.http_events().next().is_some())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, deserialize_with = "string_or_number")]
    pub stage: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub api_gateway: Option<ProviderApiGateway>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderApiGateway {
    #[serde(default)]
    pub rest_api_id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomConfig {
    #[serde(default, deserialize_with = "lenient")]
    pub api_gateway_caching: Option<CachingConfig>,
}

/// Service-wide caching block (`custom.apiGatewayCaching`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CachingConfig {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub api_gateway_is_shared: Option<bool>,
    #[serde(default, deserialize_with = "string_or_number")]
    #[schemars(with = "Option<String>")]
    pub cluster_size: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub ttl_in_seconds: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub data_encrypted: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub base_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub rest_api_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub per_key_invalidation: Option<PerKeyInvalidationConfig>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub endpoints_inherit_cloud_watch_settings_from_stage: Option<bool>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub additional_endpoints: Vec<AdditionalEndpointDeclaration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerKeyInvalidationConfig {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub require_authorization: Option<bool>,
    /// One of `Ignore`, `IgnoreWithWarning` or `Fail` (case-insensitive).
    #[serde(default, deserialize_with = "lenient")]
    pub handle_unauthorized_requests: Option<String>,
}

/// Caching block attached to a single HTTP event or additional endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCachingConfig {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub ttl_in_seconds: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub data_encrypted: Option<bool>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub cache_key_parameters: Vec<CacheKeyParameterConfig>,
    #[serde(default, deserialize_with = "lenient")]
    pub per_key_invalidation: Option<PerKeyInvalidationConfig>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub inherit_cloud_watch_settings_from_stage: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheKeyParameterConfig {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub required: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub mapped_from: Option<String>,
}

/// An HTTP route that exists in the compiled template but is not backed by a
/// declared function.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalEndpointDeclaration {
    pub method: String,
    pub path: String,
    #[serde(default, deserialize_with = "lenient")]
    pub caching: Option<EndpointCachingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    /// Deployed function name, when it differs from the manifest key.
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub events: Vec<FunctionEvent>,
}

impl FunctionDeclaration {
    pub fn http_events(&self) -> impl Iterator<Item = &HttpEvent> {
        self.events.iter().filter_map(|event| event.http.as_ref())
    }
}

/// A function trigger. Only HTTP triggers matter here; other event kinds
/// deserialize with `http` unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FunctionEvent {
    #[serde(default)]
    pub http: Option<HttpEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum HttpEvent {
    /// `"GET /cats"`
    Shorthand(String),
    Detailed(HttpEventConfig),
    /// Anything else under `http:`, e.g. a map without a `path`.
    Invalid(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpEventConfig {
    pub method: String,
    pub path: String,
    #[serde(default, deserialize_with = "lenient")]
    pub caching: Option<EndpointCachingConfig>,
}

/// Method and path of an HTTP event, as written by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRoute<'a> {
    pub method: &'a str,
    pub path: &'a str,
}

impl HttpEvent {
    /// Method and path of the event, or `None` when a shorthand string does
    /// not have the `METHOD /path` shape or the event is malformed.
    pub fn route(&self) -> Option<HttpRoute<'_>> {
        match self {
            HttpEvent::Shorthand(route) => {
                let mut parts = route.split_whitespace();
                let method = parts.next()?;
                let path = parts.next()?;
                Some(HttpRoute { method, path })
            }
            HttpEvent::Detailed(config) => Some(HttpRoute {
                method: config.method.as_str(),
                path: config.path.as_str(),
            }),
            HttpEvent::Invalid(_) => None,
        }
    }

    /// Shorthand events cannot carry a caching block.
    pub fn caching(&self) -> Option<&EndpointCachingConfig> {
        match self {
            HttpEvent::Shorthand(_) | HttpEvent::Invalid(_) => None,
            HttpEvent::Detailed(config) => config.caching.as_ref(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            warn!(value = %other, "Ignoring value that is neither a string nor a number");
            None
        }
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Some(serde_json::Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        Some(other) => {
            warn!(value = %other, "Ignoring value that is not a boolean");
            None
        }
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = match &value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };
    if parsed.is_none() {
        warn!(value = ?value, "Ignoring value that is not an integer");
    }
    Ok(parsed)
}

/// Keep a value only when it has the expected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.is_null()).and_then(|value| from_loose(&value)))
}

/// Keep the list entries that have the expected shape.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(from_loose).collect(),
        Some(other) => {
            warn!(value = %other, "Ignoring value that is not a list");
            Vec::new()
        }
    })
}

fn from_loose<T: DeserializeOwned>(value: &serde_json::Value) -> Option<T> {
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(error = %e, value = %value, "Ignoring malformed manifest value");
            None
        }
    }
}
