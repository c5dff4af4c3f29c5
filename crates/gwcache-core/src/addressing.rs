//! Endpoint addressing.
//!
//! Two views of the same `(path, method)` pair: the logical id of the method
//! resource in the compiled template, and the escaped address used by stage
//! patch operations.

use serde::Serialize;
use std::fmt;

/// Prefix of every generated method resource name.
pub const RESOURCE_NAME_PREFIX: &str = "ApiGatewayMethod";

/// Catch-all HTTP method.
pub const ANY_METHOD: &str = "ANY";

/// Typed identity of an endpoint within the resource graph.
///
/// `path` is the intrinsic route, without any base path, and `method` is
/// upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EndpointKey {
    pub method: String,
    pub path: String,
}

impl EndpointKey {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.trim().to_uppercase(),
            path: normalize_path(None, path),
        }
    }

    /// Logical id of the method resource in the compiled template.
    pub fn resource_name(&self) -> String {
        derive_resource_name(&self.path, &self.method)
    }

    pub fn is_any_method(&self) -> bool {
        self.method == ANY_METHOD
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Derive the template logical id for a method resource.
///
/// `("/cat/{pawId}", "GET")` becomes `ApiGatewayMethodCatPawidVarGet`.
pub fn derive_resource_name(path: &str, method: &str) -> String {
    let method = method.to_lowercase();
    let mut name = String::from(RESOURCE_NAME_PREFIX);
    for segment in path.split('/').chain(std::iter::once(method.as_str())) {
        name.push_str(&normalize_segment(segment));
    }
    name
}

fn normalize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '+' | '_' | '.'))
        .collect();
    let cleaned = cleaned.replace('-', "Dash");
    let cleaned = match cleaned.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(variable) => format!("{variable}Var"),
        None => cleaned,
    };
    capitalize(&cleaned)
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape a path for use as a single pointer token: `~` becomes `~0` and `/`
/// becomes `~1`. Braces stay literal.
pub fn escape_address(path: &str) -> String {
    path.replace('~', "~0").replace('/', "~1")
}

/// Patch address of one method of a path, e.g. `/~1cat~1{pawId}/GET`.
pub fn method_address(path: &str, method: &str) -> String {
    let escaped = if path.starts_with('/') {
        escape_address(path)
    } else {
        escape_address(&format!("/{path}"))
    };
    format!("/{}/{}", escaped, method.trim().to_uppercase())
}

/// Join an optional base path and a route into a rooted path without a
/// trailing slash. Interior segments are kept as declared. The root route
/// stays `/`.
pub fn normalize_path(base_path: Option<&str>, path: &str) -> String {
    let base = base_path.unwrap_or_default().trim().trim_matches('/');
    let route = path.trim().trim_start_matches('/').trim_end_matches('/');
    match (base.is_empty(), route.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => format!("/{base}"),
        (true, false) => format!("/{route}"),
        (false, false) => format!("/{base}/{route}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_names() {
        assert_eq!(derive_resource_name("/", "GET"), "ApiGatewayMethodGet");
        assert_eq!(derive_resource_name("/", "POST"), "ApiGatewayMethodPost");
        assert_eq!(
            derive_resource_name("/cat/{pawId}", "GET"),
            "ApiGatewayMethodCatPawidVarGet"
        );
        assert_eq!(derive_resource_name("/{id}", "PATCH"), "ApiGatewayMethodIdVarPatch");
    }

    #[test]
    fn test_resource_name_special_characters() {
        assert_eq!(
            derive_resource_name("/blue-items", "post"),
            "ApiGatewayMethodBlueDashitemsPost"
        );
        assert_eq!(
            derive_resource_name("/files/{proxy+}", "ANY"),
            "ApiGatewayMethodFilesProxyVarAny"
        );
        assert_eq!(
            derive_resource_name("/v1.0/cat_list", "get"),
            "ApiGatewayMethodV10CatlistGet"
        );
    }

    #[test]
    fn test_substring_neighbours_do_not_collide() {
        let long = derive_resource_name("/cat/paw/{pawId}", "GET");
        let short = derive_resource_name("/paw/{catPawId}", "GET");
        assert_eq!(long, "ApiGatewayMethodCatPawPawidVarGet");
        assert_eq!(short, "ApiGatewayMethodPawCatpawidVarGet");
        assert_ne!(long, short);
    }

    #[test]
    fn test_escape_address() {
        assert_eq!(escape_address("/cat/{pawId}"), "~1cat~1{pawId}");
        assert_eq!(escape_address("/a~b"), "~1a~0b");
        assert_eq!(escape_address("/"), "~1");
    }

    #[test]
    fn test_method_address() {
        assert_eq!(method_address("/cat/{pawId}", "get"), "/~1cat~1{pawId}/GET");
        assert_eq!(method_address("/", "GET"), "/~1/GET");
        assert_eq!(method_address("cats", "delete"), "/~1cats/DELETE");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(None, "/cats/"), "/cats");
        assert_eq!(normalize_path(None, "/"), "/");
        assert_eq!(normalize_path(None, "cats"), "/cats");
        assert_eq!(normalize_path(Some("/animals"), "/cat/{pawId}"), "/animals/cat/{pawId}");
        assert_eq!(normalize_path(Some("animals/"), "/"), "/animals");
        assert_eq!(normalize_path(Some(""), "/cats"), "/cats");
        assert_eq!(normalize_path(Some("/v1/"), "cats/"), "/v1/cats");
    }

    #[test]
    fn test_normalize_path_keeps_interior_segments() {
        assert_eq!(normalize_path(None, "/cats//x"), "/cats//x");
        assert_eq!(normalize_path(Some("/animals"), "/cats//x/"), "/animals/cats//x");
    }

    #[test]
    fn test_endpoint_key() {
        let key = EndpointKey::new("any", "/cat/");
        assert_eq!(key.method, "ANY");
        assert_eq!(key.path, "/cat");
        assert!(key.is_any_method());
        assert_eq!(key.resource_name(), "ApiGatewayMethodCatAny");
        assert_eq!(key.to_string(), "ANY /cat");
    }
}
