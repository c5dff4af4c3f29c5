//! API Gateway stage adapter.

use async_trait::async_trait;
use gwcache_core::InvokeError;
use gwcache_core::patch::PatchOperation;
use gwcache_core::ports::{GatewayError, ProviderInvoker, StageGateway};
use gwcache_core::stage::{StageSnapshot, StageTarget};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub const API_GATEWAY_SERVICE: &str = "APIGateway";

/// Error codes reported when another update to the stage is in flight.
const RETRYABLE_CODES: [&str; 1] = ["ConflictException"];

/// Lowercase message fragments that mean the same when no code is reported.
const RETRYABLE_MESSAGES: [&str; 2] = ["concurrent modification", "previous change in progress"];

/// Decide once whether a failed call may be retried.
pub fn classify(error: &InvokeError) -> GatewayError {
    let conflict_code = error
        .code
        .as_deref()
        .is_some_and(|code| RETRYABLE_CODES.contains(&code));
    let message = error.message.to_lowercase();
    let conflict_message = RETRYABLE_MESSAGES.iter().any(|fragment| message.contains(fragment));

    if conflict_code || conflict_message {
        GatewayError::Retryable(error.to_string())
    } else {
        GatewayError::Fatal(error.to_string())
    }
}

pub struct ApiGatewayClient {
    invoker: Arc<dyn ProviderInvoker>,
}

impl ApiGatewayClient {
    pub fn new(invoker: Arc<dyn ProviderInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl StageGateway for ApiGatewayClient {
    async fn fetch_stage(&self, target: &StageTarget) -> Result<StageSnapshot, GatewayError> {
        let params = json!({
            "restApiId": target.rest_api_id,
            "stageName": target.stage_name,
        });
        let response = self
            .invoker
            .invoke(API_GATEWAY_SERVICE, "getStage", params, &target.region)
            .await
            .map_err(|e| classify(&e))?;

        serde_json::from_value(response)
            .map_err(|e| GatewayError::Fatal(format!("Unexpected getStage response: {e}")))
    }

    async fn apply_patch(&self, target: &StageTarget, operations: &[PatchOperation]) -> Result<(), GatewayError> {
        debug!(target = %target, operations = operations.len(), "Calling updateStage");
        let params = json!({
            "restApiId": target.rest_api_id,
            "stageName": target.stage_name,
            "patchOperations": operations,
        });
        self.invoker
            .invoke(API_GATEWAY_SERVICE, "updateStage", params, &target.region)
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }
}
