//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external
//! adapters: the cloud provider SDK bridge, the deployed gateway stage, the
//! deployed stack's outputs, and the compiled resource graph.

use crate::error::InvokeError;
use crate::patch::PatchOperation;
use crate::stage::{StageSnapshot, StageTarget};
use async_trait::async_trait;
use thiserror::Error;

/// Classified failure of a gateway stage call.
///
/// Classification happens once, in the adapter that talks to the provider;
/// the reconciler only looks at the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Another change to the same stage is still in progress.
    #[error("Stage is being modified concurrently: {0}")]
    Retryable(String),

    #[error("Gateway request failed: {0}")]
    Fatal(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Retryable(_))
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Retryable(message) | GatewayError::Fatal(message) => message,
        }
    }
}

/// A deployed gateway stage.
#[async_trait]
pub trait StageGateway: Send + Sync {
    /// Fetch the stage's current method settings.
    async fn fetch_stage(&self, target: &StageTarget) -> Result<StageSnapshot, GatewayError>;

    /// Apply one batch of patch operations. The gateway applies a batch
    /// atomically.
    async fn apply_patch(&self, target: &StageTarget, operations: &[PatchOperation]) -> Result<(), GatewayError>;
}

/// Outputs of a deployed infrastructure stack.
#[async_trait]
pub trait StackOutputs: Send + Sync {
    /// Value of `output_key` on `stack_name`, or `None` when the stack has no
    /// such output.
    async fn output(&self, stack_name: &str, output_key: &str, region: &str) -> crate::Result<Option<String>>;
}

/// The cloud provider SDK, reached through a single generic call.
#[async_trait]
pub trait ProviderInvoker: Send + Sync {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        params: serde_json::Value,
        region: &str,
    ) -> Result<serde_json::Value, InvokeError>;
}

/// A compiled, mutable resource graph.
///
/// Lookups are exact matches on the logical id; the core edits fields of
/// the nodes it is given and never creates or removes resources.
pub trait ResourceGraph {
    fn resource_mut(&mut self, logical_id: &str) -> Option<&mut serde_json::Value>;

    /// Add or replace a stack output.
    fn set_output(&mut self, name: &str, output: serde_json::Value);
}
