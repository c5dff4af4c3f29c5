//! Settings resolution.
//!
//! Turns the raw manifest into one immutable, fully-resolved setting per
//! endpoint. The global block is resolved first and every endpoint reads its
//! fallbacks from that resolved value, never from the raw block, so nested
//! levels cannot drift from their parent.

use crate::addressing::{EndpointKey, normalize_path};
use crate::manifest::{
    CacheKeyParameterConfig, CachingConfig, EndpointCachingConfig, FunctionDeclaration,
    PerKeyInvalidationConfig, ServiceManifest,
};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_CLUSTER_SIZE: &str = "0.5";
pub const DEFAULT_TTL_IN_SECONDS: u32 = 3600;
pub const DEFAULT_DATA_ENCRYPTED: bool = false;
pub const DEFAULT_INHERIT_CLOUDWATCH_SETTINGS: bool = true;
pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_REGION: &str = "us-east-1";

/// How the gateway treats cache invalidation requests that lack authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum UnauthorizedStrategy {
    Ignore,
    #[default]
    IgnoreWithWarning,
    Fail,
}

impl UnauthorizedStrategy {
    /// Parse a user-supplied strategy name. Unknown or missing names fall back
    /// to the default.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        match value.trim().to_lowercase().as_str() {
            "ignore" => Self::Ignore,
            "ignorewithwarning" => Self::IgnoreWithWarning,
            "fail" => Self::Fail,
            other => {
                warn!(strategy = other, "Unknown handleUnauthorizedRequests value, using default");
                Self::default()
            }
        }
    }

    /// Value understood by the gateway's stage API.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Ignore => "IGNORE",
            Self::IgnoreWithWarning => "SUCCEED_WITH_RESPONSE_HEADER",
            Self::Fail => "FAIL_WITH_403",
        }
    }
}

/// Per-key cache invalidation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PerKeyInvalidation {
    RequireAuthorization { handle_unauthorized_requests: UnauthorizedStrategy },
    AllowUnauthorized,
}

impl Default for PerKeyInvalidation {
    fn default() -> Self {
        Self::RequireAuthorization {
            handle_unauthorized_requests: UnauthorizedStrategy::default(),
        }
    }
}

impl PerKeyInvalidation {
    pub fn from_config(config: Option<&PerKeyInvalidationConfig>) -> Self {
        let Some(config) = config else {
            return Self::default();
        };
        if config.require_authorization.unwrap_or(true) {
            Self::RequireAuthorization {
                handle_unauthorized_requests: UnauthorizedStrategy::parse_lenient(
                    config.handle_unauthorized_requests.as_deref(),
                ),
            }
        } else {
            Self::AllowUnauthorized
        }
    }

    pub fn requires_authorization(&self) -> bool {
        matches!(self, Self::RequireAuthorization { .. })
    }

    pub fn unauthorized_strategy(&self) -> Option<UnauthorizedStrategy> {
        match self {
            Self::RequireAuthorization { handle_unauthorized_requests } => {
                Some(*handle_unauthorized_requests)
            }
            Self::AllowUnauthorized => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCacheSettings {
    pub caching_enabled: bool,
    pub api_gateway_is_shared: bool,
    pub cluster_size: String,
    pub ttl_in_seconds: u32,
    pub data_encrypted: bool,
    pub per_key_invalidation: PerKeyInvalidation,
    pub base_path: Option<String>,
    pub rest_api_id: Option<String>,
    pub endpoints_inherit_cloud_watch_settings_from_stage: bool,
    pub stage: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKeyParameter {
    pub name: String,
    pub required: Option<bool>,
    pub mapped_from: Option<String>,
}

impl From<&CacheKeyParameterConfig> for CacheKeyParameter {
    fn from(config: &CacheKeyParameterConfig) -> Self {
        Self {
            name: config.name.clone(),
            required: config.required,
            mapped_from: config.mapped_from.clone(),
        }
    }
}

/// Resolved caching settings of one endpoint.
///
/// `function_name` is `None` for additional endpoints. When the endpoint has
/// no caching block, `caching_enabled` is false and the optional caching fields
/// stay unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCacheSettings {
    pub function_name: Option<String>,
    pub key: EndpointKey,
    pub method: String,
    pub path: String,
    pub gateway_resource_name: String,
    pub caching_enabled: bool,
    pub cache_ttl_in_seconds: Option<u32>,
    pub data_encrypted: Option<bool>,
    pub cache_key_parameters: Vec<CacheKeyParameter>,
    pub per_key_invalidation: Option<PerKeyInvalidation>,
    pub inherit_cloud_watch_settings_from_stage: bool,
}

/// Additional endpoints share the endpoint shape; they only lack a function.
pub type AdditionalEndpointSettings = EndpointCacheSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSettings {
    pub global: GlobalCacheSettings,
    pub endpoints: Vec<EndpointCacheSettings>,
    pub additional_endpoints: Vec<AdditionalEndpointSettings>,
}

impl ResolvedSettings {
    /// Function endpoints followed by additional endpoints.
    pub fn all_endpoints(&self) -> impl Iterator<Item = &EndpointCacheSettings> {
        self.endpoints.iter().chain(self.additional_endpoints.iter())
    }

    pub fn caching_endpoints(&self) -> impl Iterator<Item = &EndpointCacheSettings> {
        self.all_endpoints().filter(|endpoint| endpoint.caching_enabled)
    }
}

/// Outcome of resolution. `Undefined` means the service never declared a
/// caching block, which is distinct from caching being disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Undefined,
    Defined(ResolvedSettings),
}

impl Resolution {
    pub fn settings(&self) -> Option<&ResolvedSettings> {
        match self {
            Resolution::Undefined => None,
            Resolution::Defined(settings) => Some(settings),
        }
    }

    pub fn caching_enabled(&self) -> bool {
        self.settings().is_some_and(|s| s.global.caching_enabled)
    }
}

/// Command-line overrides for the deployment target.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub stage: Option<String>,
    pub region: Option<String>,
}

/// Stage and region the reconciliation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    pub stage: String,
    pub region: String,
}

impl DeploymentContext {
    /// Command-line options win over the manifest's provider block.
    pub fn from_manifest(manifest: &ServiceManifest, options: &ResolveOptions) -> Self {
        Self {
            stage: options
                .stage
                .clone()
                .or_else(|| manifest.provider.stage.clone())
                .unwrap_or_else(|| DEFAULT_STAGE.to_string()),
            region: options
                .region
                .clone()
                .or_else(|| manifest.provider.region.clone())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }
}

/// Resolve a whole manifest.
pub fn resolve_manifest(manifest: &ServiceManifest, options: &ResolveOptions) -> Resolution {
    let context = DeploymentContext::from_manifest(manifest, options);
    resolve(manifest.caching(), &manifest.functions, &context)
}

/// Resolve the caching block against the declared functions.
pub fn resolve(
    caching: Option<&CachingConfig>,
    functions: &IndexMap<String, FunctionDeclaration>,
    context: &DeploymentContext,
) -> Resolution {
    let Some(caching) = caching else {
        debug!("No caching configuration declared");
        return Resolution::Undefined;
    };

    let global = resolve_global(caching, context);

    let mut endpoints = Vec::new();
    for (function_name, function) in functions {
        let mut found_http_event = false;
        for event in function.http_events() {
            found_http_event = true;
            let Some(route) = event.route() else {
                warn!(function = %function_name, "Skipping malformed HTTP event, expected a method and a path");
                continue;
            };
            if let Some(endpoint) = resolve_endpoint(
                &global,
                Some(function_name),
                route.method,
                route.path,
                event.caching(),
            ) {
                endpoints.push(endpoint);
            }
        }
        if !found_http_event {
            debug!(function = %function_name, "Function has no HTTP events");
        }
    }

    let additional_endpoints = caching
        .additional_endpoints
        .iter()
        .filter_map(|declaration| {
            resolve_endpoint(
                &global,
                None,
                &declaration.method,
                &declaration.path,
                declaration.caching.as_ref(),
            )
        })
        .collect();

    Resolution::Defined(ResolvedSettings {
        global,
        endpoints,
        additional_endpoints,
    })
}

fn resolve_global(config: &CachingConfig, context: &DeploymentContext) -> GlobalCacheSettings {
    GlobalCacheSettings {
        caching_enabled: config.enabled.unwrap_or(false),
        api_gateway_is_shared: config.api_gateway_is_shared.unwrap_or(false),
        cluster_size: config
            .cluster_size
            .clone()
            .filter(|size| !size.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLUSTER_SIZE.to_string()),
        ttl_in_seconds: non_negative_ttl(config.ttl_in_seconds).unwrap_or(DEFAULT_TTL_IN_SECONDS),
        data_encrypted: config.data_encrypted.unwrap_or(DEFAULT_DATA_ENCRYPTED),
        per_key_invalidation: PerKeyInvalidation::from_config(config.per_key_invalidation.as_ref()),
        base_path: config
            .base_path
            .clone()
            .filter(|path| !path.trim_matches('/').trim().is_empty()),
        rest_api_id: config.rest_api_id.clone().filter(|id| !id.trim().is_empty()),
        endpoints_inherit_cloud_watch_settings_from_stage: config
            .endpoints_inherit_cloud_watch_settings_from_stage
            .unwrap_or(DEFAULT_INHERIT_CLOUDWATCH_SETTINGS),
        stage: context.stage.clone(),
        region: context.region.clone(),
    }
}

fn resolve_endpoint(
    global: &GlobalCacheSettings,
    function_name: Option<&str>,
    method: &str,
    path: &str,
    caching: Option<&EndpointCachingConfig>,
) -> Option<EndpointCacheSettings> {
    if method.trim().is_empty() {
        warn!(function = ?function_name, path, "Skipping endpoint without an HTTP method");
        return None;
    }

    let key = EndpointKey::new(method, path);
    let public_path = normalize_path(global.base_path.as_deref(), path);

    let mut endpoint = EndpointCacheSettings {
        function_name: function_name.map(str::to_string),
        method: key.method.clone(),
        path: public_path,
        gateway_resource_name: key.resource_name(),
        key,
        caching_enabled: false,
        cache_ttl_in_seconds: None,
        data_encrypted: None,
        cache_key_parameters: Vec::new(),
        per_key_invalidation: None,
        inherit_cloud_watch_settings_from_stage: false,
    };

    let Some(caching) = caching else {
        return Some(endpoint);
    };

    endpoint.caching_enabled = global.caching_enabled && caching.enabled.unwrap_or(false);
    endpoint.cache_ttl_in_seconds =
        Some(non_negative_ttl(caching.ttl_in_seconds).unwrap_or(global.ttl_in_seconds));
    endpoint.data_encrypted = Some(caching.data_encrypted.unwrap_or(global.data_encrypted));
    endpoint.cache_key_parameters = caching
        .cache_key_parameters
        .iter()
        .map(CacheKeyParameter::from)
        .collect();
    endpoint.per_key_invalidation = Some(match caching.per_key_invalidation.as_ref() {
        Some(own) => PerKeyInvalidation::from_config(Some(own)),
        None => global.per_key_invalidation,
    });
    endpoint.inherit_cloud_watch_settings_from_stage = caching
        .inherit_cloud_watch_settings_from_stage
        .unwrap_or(global.endpoints_inherit_cloud_watch_settings_from_stage);

    Some(endpoint)
}

fn non_negative_ttl(ttl: Option<i64>) -> Option<u32> {
    ttl.filter(|ttl| *ttl >= 0)
        .and_then(|ttl| u32::try_from(ttl).ok())
}
