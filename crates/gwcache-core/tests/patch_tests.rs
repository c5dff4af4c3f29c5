//! Patch compilation tests.

use gwcache_core::manifest::ServiceManifest;
use gwcache_core::patch::*;
use gwcache_core::settings::{ResolveOptions, ResolvedSettings, resolve_manifest};
use gwcache_core::stage::{MethodSetting, STAGE_WIDE_METHOD_KEY, StageSnapshot};
use pretty_assertions::assert_eq;

fn settings(yaml: &str) -> ResolvedSettings {
    let manifest = ServiceManifest::from_yaml_str(yaml).expect("manifest");
    resolve_manifest(&manifest, &ResolveOptions::default())
        .settings()
        .cloned()
        .expect("caching settings")
}

fn pairs(operations: &[PatchOperation]) -> Vec<(&str, &str)> {
    operations
        .iter()
        .map(|op| (op.path.as_str(), op.value.as_str()))
        .collect()
}

fn logging_stage() -> StageSnapshot {
    let mut snapshot = StageSnapshot::default();
    snapshot.method_settings.insert(
        STAGE_WIDE_METHOD_KEY.to_string(),
        MethodSetting {
            logging_level: Some("ERROR".to_string()),
            data_trace_enabled: true,
            metrics_enabled: true,
            ..MethodSetting::default()
        },
    );
    snapshot
}

#[test]
fn test_caching_disabled_without_endpoints() {
    let settings = settings("custom:\n  apiGatewayCaching:\n    enabled: false\n");
    let operations = compile(&settings, &StageSnapshot::default());
    assert_eq!(pairs(&operations), vec![("/cacheClusterEnabled", "false")]);
}

#[test]
fn test_caching_enabled_without_endpoints() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
    clusterSize: "1.6"
    ttlInSeconds: 120
    dataEncrypted: true
"#,
    );
    let operations = compile(&settings, &StageSnapshot::default());
    assert_eq!(
        pairs(&operations),
        vec![
            ("/cacheClusterEnabled", "true"),
            ("/cacheClusterSize", "1.6"),
            ("/*/*/caching/dataEncrypted", "true"),
            ("/*/*/caching/ttlInSeconds", "120"),
        ]
    );
    assert!(operations.iter().all(|op| op.op == PatchOp::Replace));
}

#[test]
fn test_enabled_endpoint_operations() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
functions:
  get-cat:
    events:
      - http:
          method: get
          path: /cat/{pawId}
          caching:
            enabled: true
            ttlInSeconds: 45
            perKeyInvalidation:
              handleUnauthorizedRequests: Ignore
"#,
    );
    let operations = endpoint_operations(&settings.endpoints[0], &StageSnapshot::default());
    assert_eq!(
        pairs(&operations),
        vec![
            ("/~1cat~1{pawId}/GET/caching/enabled", "true"),
            ("/~1cat~1{pawId}/GET/caching/ttlInSeconds", "45"),
            ("/~1cat~1{pawId}/GET/caching/dataEncrypted", "false"),
            ("/~1cat~1{pawId}/GET/caching/requireAuthorizationForCacheControl", "true"),
            ("/~1cat~1{pawId}/GET/caching/unauthorizedCacheControlHeaderStrategy", "IGNORE"),
        ]
    );
}

#[test]
fn test_disabled_endpoint_only_switches_caching_off() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
    endpointsInheritCloudWatchSettingsFromStage: false
functions:
  add-cat:
    events:
      - http: post /cats
"#,
    );
    let operations = endpoint_operations(&settings.endpoints[0], &logging_stage());
    assert_eq!(pairs(&operations), vec![("/~1cats/POST/caching/enabled", "false")]);
}

#[test]
fn test_global_off_with_endpoint_block_keeps_per_key_operations() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: false
    endpointsInheritCloudWatchSettingsFromStage: false
    perKeyInvalidation:
      requireAuthorization: false
functions:
  get-cat:
    events:
      - http:
          method: get
          path: /cat/{pawId}
          caching:
            enabled: true
"#,
    );
    let operations = endpoint_operations(&settings.endpoints[0], &StageSnapshot::default());
    assert_eq!(
        pairs(&operations),
        vec![
            ("/~1cat~1{pawId}/GET/caching/enabled", "false"),
            ("/~1cat~1{pawId}/GET/caching/requireAuthorizationForCacheControl", "false"),
        ]
    );
}

#[test]
fn test_any_method_disables_every_other_verb() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
    endpointsInheritCloudWatchSettingsFromStage: false
functions:
  cat-proxy:
    events:
      - http:
          method: any
          path: /cat
          caching:
            enabled: true
            ttlInSeconds: 3000
"#,
    );
    let operations = endpoint_operations(&settings.endpoints[0], &StageSnapshot::default());

    let enabled: Vec<(&str, &str)> = pairs(&operations)
        .into_iter()
        .filter(|(path, _)| path.ends_with("/caching/enabled"))
        .collect();
    assert_eq!(
        enabled,
        vec![
            ("/~1cat/DELETE/caching/enabled", "false"),
            ("/~1cat/HEAD/caching/enabled", "false"),
            ("/~1cat/OPTIONS/caching/enabled", "false"),
            ("/~1cat/PATCH/caching/enabled", "false"),
            ("/~1cat/POST/caching/enabled", "false"),
            ("/~1cat/PUT/caching/enabled", "false"),
            ("/~1cat/GET/caching/enabled", "true"),
        ]
    );
    assert!(pairs(&operations).contains(&("/~1cat/GET/caching/ttlInSeconds", "3000")));
    assert!(!operations.iter().any(|op| op.path.contains("/ANY/")));
}

#[test]
fn test_shared_gateway_emits_no_stage_operations() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
    apiGatewayIsShared: true
functions:
  get-cat:
    events:
      - http:
          method: get
          path: /cat/{pawId}
          caching:
            enabled: true
"#,
    );
    let operations = compile(&settings, &StageSnapshot::default());
    assert!(!operations.iter().any(|op| op.path == "/cacheClusterEnabled"));
    assert!(!operations.iter().any(|op| op.path == "/cacheClusterSize"));
    assert!(!operations.iter().any(|op| op.path.starts_with("/*/*")));
    assert!(pairs(&operations).contains(&("/~1cat~1{pawId}/GET/caching/enabled", "true")));
}

#[test]
fn test_shared_gateway_without_endpoints_has_nothing_to_do() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
    apiGatewayIsShared: true
"#,
    );
    assert!(compile(&settings, &StageSnapshot::default()).is_empty());
}

const CACHING_BLOCK_WITHOUT_CACHE: &str = r#"
custom:
  apiGatewayCaching:
    enabled: true
functions:
  list-cats:
    events:
      - http:
          method: get
          path: /cats
          caching:
            enabled: false
"#;

#[test]
fn test_cloudwatch_settings_are_copied_from_stage() {
    let settings = settings(CACHING_BLOCK_WITHOUT_CACHE);
    let operations = endpoint_operations(&settings.endpoints[0], &logging_stage());
    assert_eq!(
        pairs(&operations),
        vec![
            ("/~1cats/GET/caching/enabled", "false"),
            ("/~1cats/GET/caching/requireAuthorizationForCacheControl", "true"),
            (
                "/~1cats/GET/caching/unauthorizedCacheControlHeaderStrategy",
                "SUCCEED_WITH_RESPONSE_HEADER"
            ),
            ("/~1cats/GET/logging/loglevel", "ERROR"),
            ("/~1cats/GET/logging/dataTrace", "true"),
            ("/~1cats/GET/metrics/enabled", "true"),
        ]
    );
}

#[test]
fn test_endpoint_without_caching_block_keeps_its_cloudwatch_settings() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
functions:
  add-cat:
    events:
      - http: post /cats
"#,
    );
    let operations = compile(&settings, &logging_stage());
    assert!(
        !operations
            .iter()
            .any(|op| op.path.contains("/logging/") || op.path.contains("/metrics/"))
    );
    assert_eq!(
        pairs(&operations[4..]),
        vec![("/~1cats/POST/caching/enabled", "false")]
    );
}

#[test]
fn test_cloudwatch_settings_skipped_without_stage_wide_entry() {
    let settings = settings(CACHING_BLOCK_WITHOUT_CACHE);
    let operations = endpoint_operations(&settings.endpoints[0], &StageSnapshot::default());
    assert_eq!(operations.len(), 3);
}

#[test]
fn test_cloudwatch_log_level_omitted_when_stage_has_none() {
    let settings = settings(CACHING_BLOCK_WITHOUT_CACHE);
    let mut stage = StageSnapshot::default();
    stage
        .method_settings
        .insert(STAGE_WIDE_METHOD_KEY.to_string(), MethodSetting::default());

    let operations = endpoint_operations(&settings.endpoints[0], &stage);
    assert!(!operations.iter().any(|op| op.path.ends_with("/logging/loglevel")));
    assert_eq!(operations.len(), 5);
}

#[test]
fn test_root_path_and_base_path_addresses() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
    basePath: /animals
    endpointsInheritCloudWatchSettingsFromStage: false
    additionalEndpoints:
      - method: GET
        path: /
functions:
  get-cat:
    events:
      - http: get /cat/{pawId}
"#,
    );
    let operations = compile(&settings, &StageSnapshot::default());
    let paths: Vec<&str> = operations.iter().map(|op| op.path.as_str()).collect();
    assert!(paths.contains(&"/~1animals~1cat~1{pawId}/GET/caching/enabled"));
    assert!(paths.contains(&"/~1animals/GET/caching/enabled"));
}

#[test]
fn test_stage_operations_precede_endpoint_operations() {
    let settings = settings(
        r#"
custom:
  apiGatewayCaching:
    enabled: true
functions:
  list-cats:
    events:
      - http:
          method: get
          path: /cats
          caching:
            enabled: true
"#,
    );
    let operations = compile(&settings, &StageSnapshot::default());
    assert_eq!(operations.len(), 4 + 5);
    assert_eq!(operations[0].path, "/cacheClusterEnabled");
    assert_eq!(operations[3].path, "/*/*/caching/ttlInSeconds");
    assert_eq!(operations[4].path, "/~1cats/GET/caching/enabled");
}
