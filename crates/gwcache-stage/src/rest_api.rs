//! REST API discovery and the post-deploy stage update.

use crate::reconciler::{ReconcileReport, StageReconciler};
use gwcache_core::Result;
use gwcache_core::manifest::ServiceManifest;
use gwcache_core::ports::StackOutputs;
use gwcache_core::settings::{GlobalCacheSettings, Resolution};
use gwcache_core::template::REST_API_ID_OUTPUT;
use std::sync::Arc;
use tracing::{debug, info};

const NO_REST_API_MESSAGE: &str = "No REST API found. Caching settings will not be updated.";

/// Name of the deployed stack for a service stage.
pub fn stack_name(service: &str, stage: &str) -> String {
    format!("{service}-{stage}")
}

/// Finds the id of the REST API whose stage should be updated.
pub struct RestApiLocator {
    outputs: Arc<dyn StackOutputs>,
}

impl RestApiLocator {
    pub fn new(outputs: Arc<dyn StackOutputs>) -> Self {
        Self { outputs }
    }

    /// The caching block's `restApiId` wins, then a literal id on the
    /// provider, then the output the template update added to the deployed
    /// stack.
    pub async fn locate(&self, manifest: &ServiceManifest, global: &GlobalCacheSettings) -> Result<Option<String>> {
        if let Some(id) = &global.rest_api_id {
            debug!(rest_api_id = %id, "Using REST API id from caching settings");
            return Ok(Some(id.clone()));
        }

        if let Some(id) = manifest.predefined_rest_api_id().and_then(|id| id.as_str()) {
            debug!(rest_api_id = %id, "Using predefined REST API id");
            return Ok(Some(id.to_string()));
        }

        let stack = stack_name(&manifest.service, &global.stage);
        debug!(stack = %stack, output = REST_API_ID_OUTPUT, "Looking up REST API id in stack outputs");
        self.outputs.output(&stack, REST_API_ID_OUTPUT, &global.region).await
    }
}

/// Result of the post-deploy stage update.
#[derive(Debug)]
pub enum StageUpdate {
    NoRestApi,
    SettingsUndefined,
    Reconciled(ReconcileReport),
}

/// Post-deploy flow: locate the REST API and reconcile its stage.
pub async fn update_stage(
    manifest: &ServiceManifest,
    resolution: &Resolution,
    locator: &RestApiLocator,
    reconciler: &StageReconciler,
) -> Result<StageUpdate> {
    if !manifest.rest_api_exists() {
        info!("{NO_REST_API_MESSAGE}");
        return Ok(StageUpdate::NoRestApi);
    }

    let Some(settings) = resolution.settings() else {
        info!("No caching settings declared, stage will not be updated");
        return Ok(StageUpdate::SettingsUndefined);
    };

    let Some(rest_api_id) = locator.locate(manifest, &settings.global).await? else {
        info!("{NO_REST_API_MESSAGE}");
        return Ok(StageUpdate::NoRestApi);
    };

    let report = reconciler.reconcile(resolution, &rest_api_id).await?;
    Ok(StageUpdate::Reconciled(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_name() {
        assert_eq!(stack_name("cat-api", "prod"), "cat-api-prod");
    }
}
