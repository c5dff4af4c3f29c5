//! Patch compilation.
//!
//! Produces the ordered `replace` operations sent to the gateway's stage
//! update API. Stage-wide operations come first, followed by per-method
//! operations in endpoint order; within one batch the gateway applies later
//! operations over earlier ones, so the `/*/*` defaults are overridden by
//! per-method values.

use crate::addressing::method_address;
use crate::settings::{EndpointCacheSettings, GlobalCacheSettings, ResolvedSettings};
use crate::stage::StageSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Verbs whose caching is switched off when an endpoint is declared with the
/// `ANY` method. Caching settings of `ANY` endpoints apply to `GET` only.
pub const ANY_METHOD_DISABLED_VERBS: [&str; 6] = ["DELETE", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"];

/// Method that receives the real settings of an `ANY` endpoint.
pub const ANY_METHOD_CACHED_VERB: &str = "GET";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: String,
}

impl PatchOperation {
    pub fn replace(path: impl Into<String>, value: impl ToString) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: value.to_string(),
        }
    }
}

/// Compile every operation for a resolved settings tree.
pub fn compile(settings: &ResolvedSettings, live_stage: &StageSnapshot) -> Vec<PatchOperation> {
    let mut operations = stage_operations(&settings.global);
    for endpoint in settings.all_endpoints() {
        operations.extend(endpoint_operations(endpoint, live_stage));
    }
    debug!(
        operations = operations.len(),
        endpoints = settings.endpoints.len(),
        additional_endpoints = settings.additional_endpoints.len(),
        "Compiled stage patch"
    );
    operations
}

/// Stage-wide cache cluster operations. None when the gateway is shared.
pub fn stage_operations(global: &GlobalCacheSettings) -> Vec<PatchOperation> {
    if global.api_gateway_is_shared {
        return Vec::new();
    }

    let mut operations = vec![PatchOperation::replace("/cacheClusterEnabled", global.caching_enabled)];
    if global.caching_enabled {
        operations.push(PatchOperation::replace("/cacheClusterSize", &global.cluster_size));
        operations.push(PatchOperation::replace("/*/*/caching/dataEncrypted", global.data_encrypted));
        operations.push(PatchOperation::replace("/*/*/caching/ttlInSeconds", global.ttl_in_seconds));
    }
    operations
}

/// Operations for one endpoint, including `ANY` expansion.
pub fn endpoint_operations(endpoint: &EndpointCacheSettings, live_stage: &StageSnapshot) -> Vec<PatchOperation> {
    if endpoint.path.is_empty() || endpoint.method.is_empty() {
        warn!(
            function = ?endpoint.function_name,
            resource = %endpoint.gateway_resource_name,
            "Endpoint has no path or method, skipping its stage settings"
        );
        return Vec::new();
    }

    let mut operations = Vec::new();
    let method = if endpoint.key.is_any_method() {
        for verb in ANY_METHOD_DISABLED_VERBS {
            operations.push(PatchOperation::replace(
                format!("{}/caching/enabled", method_address(&endpoint.path, verb)),
                false,
            ));
        }
        ANY_METHOD_CACHED_VERB
    } else {
        endpoint.method.as_str()
    };

    let address = method_address(&endpoint.path, method);
    operations.extend(caching_operations(&address, endpoint));
    operations.extend(cloudwatch_operations(&address, endpoint, live_stage));
    operations
}

fn caching_operations(address: &str, endpoint: &EndpointCacheSettings) -> Vec<PatchOperation> {
    let mut operations = vec![PatchOperation::replace(
        format!("{address}/caching/enabled"),
        endpoint.caching_enabled,
    )];

    if endpoint.caching_enabled {
        if let Some(ttl) = endpoint.cache_ttl_in_seconds {
            operations.push(PatchOperation::replace(format!("{address}/caching/ttlInSeconds"), ttl));
        }
        if let Some(encrypted) = endpoint.data_encrypted {
            operations.push(PatchOperation::replace(format!("{address}/caching/dataEncrypted"), encrypted));
        }
    }

    if let Some(policy) = endpoint.per_key_invalidation {
        operations.push(PatchOperation::replace(
            format!("{address}/caching/requireAuthorizationForCacheControl"),
            policy.requires_authorization(),
        ));
        if let Some(strategy) = policy.unauthorized_strategy() {
            operations.push(PatchOperation::replace(
                format!("{address}/caching/unauthorizedCacheControlHeaderStrategy"),
                strategy.as_wire(),
            ));
        }
    }

    operations
}

fn cloudwatch_operations(
    address: &str,
    endpoint: &EndpointCacheSettings,
    live_stage: &StageSnapshot,
) -> Vec<PatchOperation> {
    if !endpoint.inherit_cloud_watch_settings_from_stage {
        return Vec::new();
    }
    let Some(stage_wide) = live_stage.stage_wide() else {
        return Vec::new();
    };

    let mut operations = Vec::new();
    if let Some(level) = &stage_wide.logging_level {
        operations.push(PatchOperation::replace(format!("{address}/logging/loglevel"), level));
    }
    operations.push(PatchOperation::replace(
        format!("{address}/logging/dataTrace"),
        stage_wide.data_trace_enabled,
    ));
    operations.push(PatchOperation::replace(
        format!("{address}/metrics/enabled"),
        stage_wide.metrics_enabled,
    ));
    operations
}
