//! Diagnostic handler that reflects what the gateway made of a request.

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::GatewayResult;
use crate::handlers::{Handler, HandlerContext};
use crate::params::ParamSet;

#[derive(Debug, Serialize)]
struct EchoBody<'a> {
    route: &'a str,
    params: &'a ParamSet,
    principal: Option<&'a str>,
    request_id: &'a str,
}

/// Returns the route name, canonical parameters and principal as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, ctx: HandlerContext) -> GatewayResult<Response> {
        let body = EchoBody {
            route: &ctx.route,
            params: &ctx.params,
            principal: ctx.identity.as_ref().map(|id| id.principal.as_str()),
            request_id: &ctx.request_id,
        };
        Ok(Json(body).into_response())
    }
}
