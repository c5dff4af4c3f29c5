use crate::config::{CliConfig, OutputFormat};
use crate::handlers::*;
use gwcache_core::manifest::ServiceManifest;
use gwcache_core::settings::ResolveOptions;
use gwcache_core::stage::StageSnapshot;
use std::fs;

const MANIFEST: &str = r#"
service: cat-api
provider:
  stage: dev
custom:
  apiGatewayCaching:
    enabled: true
    ttlInSeconds: 300
functions:
  get-cat:
    events:
      - http:
          method: get
          path: /cat/{pawId}
          caching:
            enabled: true
            cacheKeyParameters:
              - name: request.path.pawId
  add-cat:
    events:
      - http: post /cats
"#;

const TEMPLATE: &str = r#"{
  "Resources": {
    "ApiGatewayRestApi": { "Type": "AWS::ApiGateway::RestApi" },
    "ApiGatewayMethodCatPawidVarGet": {
      "Type": "AWS::ApiGateway::Method",
      "Properties": { "HttpMethod": "GET", "Integration": { "Type": "AWS" } }
    }
  }
}"#;

#[test]
fn test_build_plan() {
    let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
    let plan = build_plan(&manifest, &ResolveOptions::default(), &StageSnapshot::default(), 80).unwrap();

    assert_eq!(plan.stage, "dev");
    assert_eq!(plan.region, "us-east-1");
    assert!(plan.caching_enabled);
    assert_eq!(plan.caching_endpoints, 1);
    assert_eq!(plan.batches, 1);
    // 4 stage operations, 5 for the cached endpoint, 1 for the uncached one
    assert_eq!(plan.operations.len(), 10);
    assert_eq!(plan.operations[0].path, "/cacheClusterEnabled");
}

#[test]
fn test_build_plan_without_caching_block() {
    let manifest = ServiceManifest::from_yaml_str("service: cat-api\n").unwrap();
    assert!(build_plan(&manifest, &ResolveOptions::default(), &StageSnapshot::default(), 80).is_none());
}

#[test]
fn test_build_plan_respects_batch_size() {
    let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
    let plan = build_plan(&manifest, &ResolveOptions::default(), &StageSnapshot::default(), 4).unwrap();
    assert_eq!(plan.batches, 3);
}

#[test]
fn test_resolve_options_region_precedence() {
    let mut config = CliConfig::default();
    config.set("region", "ap-south-1").unwrap();

    let without_region = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
    let options = resolve_options(&without_region, &config, None, None);
    assert_eq!(options.region.as_deref(), Some("ap-south-1"));

    let with_region = ServiceManifest::from_yaml_str("provider:\n  region: eu-west-1\n").unwrap();
    let options = resolve_options(&with_region, &config, None, None);
    assert_eq!(options.region, None);

    let options = resolve_options(&with_region, &config, Some("qa".to_string()), Some("us-west-2".to_string()));
    assert_eq!(options.stage.as_deref(), Some("qa"));
    assert_eq!(options.region.as_deref(), Some("us-west-2"));
}

#[test]
fn test_render_formats() {
    let manifest = ServiceManifest::from_yaml_str(MANIFEST).unwrap();
    let plan = build_plan(&manifest, &ResolveOptions::default(), &StageSnapshot::default(), 80).unwrap();

    let json = render(&plan, OutputFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["cachingEnabled"], serde_json::json!(true));
    assert_eq!(parsed["operations"][0]["op"], serde_json::json!("replace"));

    let yaml = render(&plan, OutputFormat::Yaml).unwrap();
    assert!(yaml.contains("cachingEndpoints: 1"));
}

#[test]
fn test_annotate_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("serverless.yml");
    let template_path = dir.path().join("template.json");
    let output_path = dir.path().join("annotated.json");
    fs::write(&manifest_path, MANIFEST).unwrap();
    fs::write(&template_path, TEMPLATE).unwrap();

    annotate(&manifest_path, &template_path, Some(&output_path)).unwrap();

    let annotated: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
    let integration = &annotated["Resources"]["ApiGatewayMethodCatPawidVarGet"]["Properties"]["Integration"];
    assert_eq!(
        integration["CacheKeyParameters"],
        serde_json::json!(["method.request.path.pawId"])
    );
    assert_eq!(
        annotated["Outputs"]["RestApiIdForApiGwCaching"]["Value"],
        serde_json::json!({ "Ref": "ApiGatewayRestApi" })
    );

    // The input template is untouched when an output path is given.
    assert_eq!(fs::read_to_string(&template_path).unwrap(), TEMPLATE);
}

#[test]
fn test_annotate_in_place_without_rest_api() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("serverless.yml");
    let template_path = dir.path().join("template.json");
    fs::write(&manifest_path, "service: worker\nfunctions:\n  tick:\n    events:\n      - schedule: rate(1 hour)\n").unwrap();
    fs::write(&template_path, TEMPLATE).unwrap();

    annotate(&manifest_path, &template_path, None).unwrap();
    assert_eq!(fs::read_to_string(&template_path).unwrap(), TEMPLATE);
}

#[test]
fn test_load_manifest_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_manifest(&dir.path().join("missing.yml")).unwrap_err();
    assert!(err.to_string().contains("Could not read manifest"));
}
