//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the route for a method and path
//! - Distinguish "no such path" from "path exists, method not accepted"
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) pattern scan in config order (acceptable for typical route counts)
//! - First route whose pattern and method both match wins

use axum::http::Method;
use url::Url;

use crate::auth::AuthPolicy;
use crate::config::{ConfigError, RouteConfig, TargetConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::params::{ParamRules, ParamSet};
use crate::routing::matcher::PathPattern;

/// Where a matched request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Registered backend handler, by name.
    Handler(String),
    /// Upstream base URL; the request is streamed through.
    Proxy(Url),
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub methods: Vec<Method>,
    pub pattern: PathPattern,
    pub target: RouteTarget,
    pub rules: ParamRules,
    pub auth: AuthPolicy,
}

impl Route {
    pub fn from_config(config: &RouteConfig) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid(format!("route `{}`: {}", config.name, reason));

        let methods = config
            .methods
            .iter()
            .map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|e| invalid(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let pattern = PathPattern::parse(&config.path).map_err(|e| invalid(e.to_string()))?;

        let target = match &config.target {
            TargetConfig::Handler { handler } => RouteTarget::Handler(handler.clone()),
            TargetConfig::Proxy { upstream } => {
                RouteTarget::Proxy(Url::parse(upstream).map_err(|e| invalid(e.to_string()))?)
            }
        };

        Ok(Self {
            name: config.name.clone(),
            methods,
            pattern,
            target,
            rules: ParamRules {
                attrs: config.attrs.clone(),
                fields: config.fields.clone(),
            },
            auth: config.auth.clone(),
        })
    }

    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub path_params: ParamSet,
}

/// The compiled, ordered route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, ConfigError> {
        let routes = configs.iter().map(Route::from_config).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the route for `method` and `path`.
    ///
    /// Returns `NotFound` when no pattern matches and `MethodNotAllowed`
    /// (listing the methods of every matching pattern) when patterns match
    /// but none accepts the method.
    pub fn lookup(&self, method: &Method, path: &str) -> GatewayResult<RouteMatch<'_>> {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(path_params) = route.pattern.matches(path) else {
                continue;
            };
            if route.accepts(method) {
                return Ok(RouteMatch { route, path_params });
            }
            for m in &route.methods {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if allowed.is_empty() {
            Err(GatewayError::NotFound(path.to_string()))
        } else {
            Err(GatewayError::MethodNotAllowed {
                method: method.clone(),
                allowed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::params::ParamValue;

    fn table() -> RouteTable {
        let config = parse_config(
            r#"
            [[routes]]
            name = "collections.show"
            methods = ["GET"]
            path = "/arvados/v1/collections/{uuid}"
            target = { kind = "handler", handler = "echo" }

            [[routes]]
            name = "collections.update"
            methods = ["PUT", "PATCH"]
            path = "/arvados/v1/collections/{uuid}"
            target = { kind = "handler", handler = "echo" }

            [[routes]]
            name = "git"
            methods = ["get", "post"]
            path = "/{repo}.git/{*rest}"
            target = { kind = "proxy", upstream = "http://127.0.0.1:9001" }
            "#,
        )
        .unwrap();
        RouteTable::from_config(&config.routes).unwrap()
    }

    #[test]
    fn lookup_by_method() {
        let table = table();
        let m = table.lookup(&Method::GET, "/arvados/v1/collections/abc").unwrap();
        assert_eq!(m.route.name, "collections.show");
        assert_eq!(m.path_params.get("uuid"), Some(&ParamValue::from("abc")));

        let m = table.lookup(&Method::PATCH, "/arvados/v1/collections/abc").unwrap();
        assert_eq!(m.route.name, "collections.update");
    }

    #[test]
    fn methods_are_normalized() {
        let table = table();
        let m = table.lookup(&Method::POST, "/repo.git/git-receive-pack").unwrap();
        assert!(matches!(m.route.target, RouteTarget::Proxy(_)));
    }

    #[test]
    fn not_found() {
        let err = table().lookup(&Method::GET, "/nope").unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[test]
    fn method_not_allowed_lists_every_matching_route() {
        let err = table().lookup(&Method::DELETE, "/arvados/v1/collections/abc").unwrap_err();
        match err {
            GatewayError::MethodNotAllowed { method, allowed } => {
                assert_eq!(method, Method::DELETE);
                assert_eq!(allowed, vec![Method::GET, Method::PUT, Method::PATCH]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
