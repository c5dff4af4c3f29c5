//! Live stage types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Method-settings key that applies to every resource and method of a stage.
pub const STAGE_WIDE_METHOD_KEY: &str = "*/*";

/// Stage of a REST API in a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTarget {
    pub rest_api_id: String,
    pub stage_name: String,
    pub region: String,
}

impl StageTarget {
    pub fn new(
        rest_api_id: impl Into<String>,
        stage_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            rest_api_id: rest_api_id.into(),
            stage_name: stage_name.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for StageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.rest_api_id, self.stage_name, self.region)
    }
}

/// The subset of a deployed stage's configuration that reconciliation reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    #[serde(default)]
    pub method_settings: HashMap<String, MethodSetting>,
}

impl StageSnapshot {
    /// Settings applied to all methods of the stage, if the stage has any.
    pub fn stage_wide(&self) -> Option<&MethodSetting> {
        self.method_settings.get(STAGE_WIDE_METHOD_KEY)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSetting {
    #[serde(default)]
    pub logging_level: Option<String>,
    #[serde(default)]
    pub data_trace_enabled: bool,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default)]
    pub caching_enabled: Option<bool>,
    #[serde(default)]
    pub cache_ttl_in_seconds: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_get_stage_response() {
        let response = serde_json::json!({
            "stageName": "dev",
            "cacheClusterEnabled": false,
            "methodSettings": {
                "*/*": {
                    "metricsEnabled": true,
                    "loggingLevel": "INFO",
                    "dataTraceEnabled": false,
                    "throttlingBurstLimit": 5000
                }
            }
        });

        let snapshot: StageSnapshot = serde_json::from_value(response).unwrap();
        let stage_wide = snapshot.stage_wide().unwrap();
        assert_eq!(stage_wide.logging_level.as_deref(), Some("INFO"));
        assert!(stage_wide.metrics_enabled);
        assert!(!stage_wide.data_trace_enabled);
    }

    #[test]
    fn test_snapshot_without_method_settings() {
        let snapshot: StageSnapshot = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(snapshot.stage_wide().is_none());
    }
}
