//! Compiled template annotation.
//!
//! Wires cache key parameters into method resources of an already compiled
//! template and exposes the REST API id as a stack output so the stage update
//! can find it after deployment.

use crate::manifest::ServiceManifest;
use crate::ports::ResourceGraph;
use crate::settings::{CacheKeyParameter, EndpointCacheSettings, ResolvedSettings, Resolution};
use crate::{Error, Result};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

/// Stack output that carries the REST API id.
pub const REST_API_ID_OUTPUT: &str = "RestApiIdForApiGwCaching";

/// Logical id of the REST API created by the deployment tool.
pub const DEFAULT_REST_API_LOGICAL_ID: &str = "ApiGatewayRestApi";

const AWS_PROXY_INTEGRATION: &str = "AWS_PROXY";

/// Method request sources that must be declared on the method before they
/// can be mapped.
const METHOD_REQUEST_SOURCES: [&str; 3] = [
    "method.request.querystring",
    "method.request.header",
    "method.request.path",
];

/// A CloudFormation-style template document.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    document: Value,
}

impl CompiledTemplate {
    pub fn new(document: Value) -> Result<Self> {
        if !document.is_object() {
            return Err(Error::InvalidTemplate("template root must be an object".to_string()));
        }
        Ok(Self { document })
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        Self::new(serde_json::from_str(contents)?)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}

impl ResourceGraph for CompiledTemplate {
    fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Value> {
        self.document.get_mut("Resources")?.get_mut(logical_id)
    }

    fn set_output(&mut self, name: &str, output: Value) {
        let Value::Object(root) = &mut self.document else {
            return;
        };
        object_field(root, "Outputs").insert(name.to_string(), output);
    }
}

/// What annotation touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    pub annotated: Vec<String>,
    pub missing: Vec<String>,
}

/// Result of the pre-deployment template update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateUpdate {
    /// The service has no REST API; the template was left alone.
    NoRestApi,
    Updated {
        /// `None` when caching is undefined or disabled.
        annotation: Option<AnnotationReport>,
    },
}

/// Pre-deployment flow: expose the REST API id and, when caching is enabled,
/// wire cache key parameters.
pub fn update_template<G>(manifest: &ServiceManifest, resolution: &Resolution, graph: &mut G) -> TemplateUpdate
where
    G: ResourceGraph + ?Sized,
{
    if !manifest.rest_api_exists() {
        info!("No REST API found. Caching settings will not be updated.");
        return TemplateUpdate::NoRestApi;
    }

    output_rest_api_id(graph, manifest.predefined_rest_api_id());

    let annotation = match resolution.settings() {
        Some(settings) if settings.global.caching_enabled => Some(add_cache_key_parameters(settings, graph)),
        _ => None,
    };
    TemplateUpdate::Updated { annotation }
}

/// Add the REST API id output. A predefined id (literal or intrinsic) is used
/// as is; otherwise the output references the generated REST API.
pub fn output_rest_api_id<G>(graph: &mut G, predefined: Option<&Value>)
where
    G: ResourceGraph + ?Sized,
{
    let value = predefined
        .cloned()
        .unwrap_or_else(|| json!({ "Ref": DEFAULT_REST_API_LOGICAL_ID }));
    graph.set_output(
        REST_API_ID_OUTPUT,
        json!({
            "Description": "Rest API Id",
            "Value": value,
        }),
    );
}

/// Wire the cache key parameters of every endpoint that declares some.
pub fn add_cache_key_parameters<G>(settings: &ResolvedSettings, graph: &mut G) -> AnnotationReport
where
    G: ResourceGraph + ?Sized,
{
    let mut report = AnnotationReport::default();

    for endpoint in settings.all_endpoints() {
        if endpoint.cache_key_parameters.is_empty() {
            continue;
        }
        let name = &endpoint.gateway_resource_name;
        let Some(Value::Object(node)) = graph.resource_mut(name) else {
            warn!(
                resource = %name,
                endpoint = %endpoint.key,
                "Method not found in the compiled template, cache key parameters will not be set"
            );
            report.missing.push(name.clone());
            continue;
        };
        annotate_method(node, endpoint);
        debug!(resource = %name, parameters = endpoint.cache_key_parameters.len(), "Wired cache key parameters");
        report.annotated.push(name.clone());
    }

    report
}

/// How one cache key parameter maps onto a method resource.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKeyWiring {
    /// Method request parameter to declare, with its `required` flag.
    method_parameter: Option<(String, bool)>,
    /// Integration request parameter and its source.
    integration_mapping: Option<(String, String)>,
    cache_key: String,
}

impl CacheKeyWiring {
    fn for_parameter(parameter: &CacheKeyParameter, proxy_integration: bool) -> Self {
        let required = parameter.required.unwrap_or(false);
        match &parameter.mapped_from {
            None => {
                let method_parameter = format!("method.{}", parameter.name);
                Self {
                    method_parameter: Some((method_parameter.clone(), required)),
                    // Proxy integrations break when a header is mapped onto itself
                    // with different casing, so they get no integration mapping.
                    integration_mapping: (!proxy_integration)
                        .then(|| (format!("integration.{}", parameter.name), method_parameter.clone())),
                    cache_key: method_parameter,
                }
            }
            Some(source) => Self {
                method_parameter: METHOD_REQUEST_SOURCES
                    .iter()
                    .any(|prefix| source.contains(prefix))
                    .then(|| (source.clone(), required)),
                integration_mapping: Some((parameter.name.clone(), source.clone())),
                cache_key: parameter.name.clone(),
            },
        }
    }
}

fn annotate_method(node: &mut Map<String, Value>, endpoint: &EndpointCacheSettings) {
    let properties = object_field(node, "Properties");
    let proxy_integration = properties
        .get("Integration")
        .and_then(|integration| integration.get("Type"))
        .and_then(Value::as_str)
        == Some(AWS_PROXY_INTEGRATION);

    let wirings: Vec<CacheKeyWiring> = endpoint
        .cache_key_parameters
        .iter()
        .map(|parameter| CacheKeyWiring::for_parameter(parameter, proxy_integration))
        .collect();

    let request_parameters = object_field(properties, "RequestParameters");
    for (name, required) in wirings.iter().filter_map(|w| w.method_parameter.as_ref()) {
        let slot = request_parameters.entry(name.clone()).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Bool(*required);
        }
    }

    let integration = object_field(properties, "Integration");
    {
        let integration_parameters = object_field(integration, "RequestParameters");
        for (name, source) in wirings.iter().filter_map(|w| w.integration_mapping.as_ref()) {
            integration_parameters.insert(name.clone(), Value::String(source.clone()));
        }
    }
    {
        let cache_keys = array_field(integration, "CacheKeyParameters");
        for wiring in &wirings {
            let key = Value::String(wiring.cache_key.clone());
            if !cache_keys.contains(&key) {
                cache_keys.push(key);
            }
        }
    }
    integration.insert(
        "CacheNamespace".to_string(),
        Value::String(format!("{}CacheNS", endpoint.gateway_resource_name)),
    );
}

fn object_field<'a>(parent: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = parent.entry(key).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just set to an object"),
    }
}

fn array_field<'a>(parent: &'a mut Map<String, Value>, key: &str) -> &'a mut Vec<Value> {
    let slot = parent.entry(key).or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just set to an array"),
    }
}
