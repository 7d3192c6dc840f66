//! Backend handlers.
//!
//! A handler receives the canonical parameter set of a request once it has
//! been normalized and authorized. Handlers never see the raw body.
//!
//! # Design Decisions
//! - Handlers are looked up by name; routes reference them from config
//! - The registry is built before the server starts and is read-only afterwards

pub mod echo;

use async_trait::async_trait;
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{Identity, Token};
use crate::error::GatewayResult;
use crate::params::ParamSet;

pub use echo::EchoHandler;

/// Everything a handler is given for one request.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Name of the matched route.
    pub route: String,
    pub params: ParamSet,
    pub token: Option<Token>,
    /// Present when a credential was supplied and validated.
    pub identity: Option<Identity>,
    pub request_id: String,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: HandlerContext) -> GatewayResult<Response>;
}

/// Name → handler table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("echo", Arc::new(EchoHandler));
        registry
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}
