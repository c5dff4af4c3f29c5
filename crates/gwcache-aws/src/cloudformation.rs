//! Stack output lookup through CloudFormation `describeStacks`.

use async_trait::async_trait;
use gwcache_core::Result;
use gwcache_core::ports::{ProviderInvoker, StackOutputs};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CLOUDFORMATION_SERVICE: &str = "CloudFormation";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    #[serde(default)]
    stacks: Vec<Stack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Stack {
    #[serde(default)]
    outputs: Vec<StackOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackOutput {
    output_key: String,
    #[serde(default)]
    output_value: Option<String>,
}

pub struct CloudFormationClient {
    invoker: Arc<dyn ProviderInvoker>,
}

impl CloudFormationClient {
    pub fn new(invoker: Arc<dyn ProviderInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl StackOutputs for CloudFormationClient {
    async fn output(&self, stack_name: &str, output_key: &str, region: &str) -> Result<Option<String>> {
        let response = self
            .invoker
            .invoke(
                CLOUDFORMATION_SERVICE,
                "describeStacks",
                json!({ "StackName": stack_name }),
                region,
            )
            .await?;
        let response: DescribeStacksResponse = serde_json::from_value(response)?;

        let Some(stack) = response.stacks.into_iter().next() else {
            warn!(stack = stack_name, "Stack not found");
            return Ok(None);
        };
        let value = stack
            .outputs
            .into_iter()
            .find(|output| output.output_key == output_key)
            .and_then(|output| output.output_value);
        debug!(stack = stack_name, output = output_key, found = value.is_some(), "Read stack output");
        Ok(value)
    }
}
