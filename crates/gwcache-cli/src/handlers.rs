//! Command handlers.

use crate::config::{CliConfig, OutputFormat};
use console::style;
use gwcache_aws::{ApiGatewayClient, CloudFormationClient, HttpInvoker};
use gwcache_core::manifest::ServiceManifest;
use gwcache_core::patch::{PatchOperation, compile};
use gwcache_core::settings::{ResolveOptions, resolve_manifest};
use gwcache_core::stage::StageSnapshot;
use gwcache_core::template::{CompiledTemplate, TemplateUpdate, update_template};
use gwcache_stage::batch::chunk;
use gwcache_stage::{ReconcileOutcome, ReconcileReport, RestApiLocator, StageReconciler, StageUpdate, update_stage};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// What `plan` prints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub stage: String,
    pub region: String,
    pub caching_enabled: bool,
    pub caching_endpoints: usize,
    pub batches: usize,
    pub operations: Vec<PatchOperation>,
}

pub fn load_manifest(path: &Path) -> Result<ServiceManifest, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Could not read manifest {}: {}", path.display(), e))?;
    Ok(ServiceManifest::from_yaml_str(&content)?)
}

/// Command-line values win; the configured region only fills in when the
/// manifest names none either.
pub fn resolve_options(
    manifest: &ServiceManifest,
    config: &CliConfig,
    stage: Option<String>,
    region: Option<String>,
) -> ResolveOptions {
    let region = match region {
        Some(region) => Some(region),
        None if manifest.provider.region.is_none() => config.region.clone(),
        None => None,
    };
    ResolveOptions { stage, region }
}

/// Compile the patch set offline. `None` when the manifest declares no
/// caching settings.
pub fn build_plan(
    manifest: &ServiceManifest,
    options: &ResolveOptions,
    live_stage: &StageSnapshot,
    batch_size: usize,
) -> Option<PlanOutput> {
    let resolution = resolve_manifest(manifest, options);
    let settings = resolution.settings()?;
    let operations = compile(settings, live_stage);

    Some(PlanOutput {
        stage: settings.global.stage.clone(),
        region: settings.global.region.clone(),
        caching_enabled: settings.global.caching_enabled,
        caching_endpoints: settings.caching_endpoints().count(),
        batches: chunk(operations.clone(), batch_size).len(),
        operations,
    })
}

pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

/// Print the operations a reconcile would apply.
pub fn plan(
    config: &CliConfig,
    manifest_path: &Path,
    stage: Option<String>,
    region: Option<String>,
    stage_settings: Option<&Path>,
    format: Option<OutputFormat>,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = load_manifest(manifest_path)?;
    let options = resolve_options(&manifest, config, stage, region);
    let live_stage: StageSnapshot = match stage_settings {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => StageSnapshot::default(),
    };

    let Some(plan) = build_plan(&manifest, &options, &live_stage, config.batch_size) else {
        println!("{} No apiGatewayCaching settings declared, nothing to plan", style("!").yellow());
        return Ok(());
    };
    if plan.caching_enabled && plan.caching_endpoints == 0 {
        warn!("API Gateway caching is enabled but none of the endpoints have caching enabled");
    }

    println!("{}", render(&plan, format.unwrap_or(config.output_format))?);
    Ok(())
}

/// Add the REST API id output and cache key wiring to a compiled template.
pub fn annotate(
    manifest_path: &Path,
    template_path: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = load_manifest(manifest_path)?;
    let resolution = resolve_manifest(&manifest, &ResolveOptions::default());
    let content = std::fs::read_to_string(template_path)
        .map_err(|e| format!("Could not read template {}: {}", template_path.display(), e))?;
    let mut template = CompiledTemplate::from_json_str(&content)?;

    match update_template(&manifest, &resolution, &mut template) {
        TemplateUpdate::NoRestApi => {
            println!("{} No REST API found, template left unchanged", style("!").yellow());
        }
        TemplateUpdate::Updated { annotation } => {
            let destination = output.unwrap_or(template_path);
            std::fs::write(destination, template.to_json_pretty()?)?;
            println!("{} Wrote {}", style("✓").green(), destination.display());

            if let Some(report) = annotation {
                println!("  Methods with cache key parameters: {}", report.annotated.len());
                for missing in &report.missing {
                    println!("  {} {} not found in template", style("!").yellow(), missing);
                }
            }
        }
    }

    Ok(())
}

/// Apply caching settings to the deployed stage.
pub async fn reconcile(
    config: &CliConfig,
    manifest_path: &Path,
    stage: Option<String>,
    region: Option<String>,
    rest_api_id: Option<String>,
    deadline_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = load_manifest(manifest_path)?;
    let options = resolve_options(&manifest, config, stage, region);
    let resolution = resolve_manifest(&manifest, &options);

    let invoker = Arc::new(HttpInvoker::new(&config.bridge_config())?);
    let mut reconciler = StageReconciler::new(Arc::new(ApiGatewayClient::new(invoker.clone())))
        .with_retry_policy(config.retry_policy())
        .with_batch_size(config.batch_size);
    if let Some(secs) = deadline_secs {
        reconciler = reconciler.with_deadline(Duration::from_secs(secs));
    }

    println!("{} Updating API Gateway cache settings", style("→").cyan());
    let update = match rest_api_id {
        Some(id) => StageUpdate::Reconciled(reconciler.reconcile(&resolution, &id).await?),
        None => {
            let locator = RestApiLocator::new(Arc::new(CloudFormationClient::new(invoker)));
            update_stage(&manifest, &resolution, &locator, &reconciler).await?
        }
    };

    match update {
        StageUpdate::NoRestApi => println!(
            "{} No REST API found. Caching settings were not updated.",
            style("!").yellow()
        ),
        StageUpdate::SettingsUndefined => println!(
            "{} No apiGatewayCaching settings declared, stage left unchanged",
            style("!").yellow()
        ),
        StageUpdate::Reconciled(report) => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &ReconcileReport) {
    match report.outcome {
        ReconcileOutcome::SettingsUndefined => {
            println!("{} No apiGatewayCaching settings declared", style("!").yellow());
        }
        ReconcileOutcome::NothingToApply => {
            println!("{} Nothing to update", style("✓").green());
        }
        ReconcileOutcome::Applied => {
            println!(
                "{} Done updating API Gateway cache settings ({})",
                style("✓").green(),
                style(report.id).dim()
            );
            if let Some(target) = &report.target {
                println!("  Stage: {}", target);
            }
            println!(
                "  Operations: {} in {} batch(es), {} call(s), {} ms",
                report.operations,
                report.batches,
                report.apply_calls,
                report.duration_ms()
            );
        }
    }
}

/// Print the manifest schema.
pub fn schema() -> Result<(), Box<dyn std::error::Error>> {
    let schema = schemars::schema_for!(ServiceManifest);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current configuration:");
    println!("  bridge_url: {}", config.bridge_url);
    println!("  region: {}", config.region.as_deref().unwrap_or("(not set)"));
    println!("  retry_base_delay_ms: {}", config.retry_base_delay_ms);
    println!("  max_attempts: {}", config.max_attempts);
    println!("  batch_size: {}", config.batch_size);
    println!("  output_format: {:?}", config.output_format);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }

    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CliConfig::load().unwrap_or_default();
    config.set(key, value)?;
    config.save()?;

    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}
