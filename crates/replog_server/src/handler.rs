//! Request routing and the generic repository routes.

use crate::auth::{operations, Authorizer};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use replog_core::Repository;
use replog_protocol::query::{self, decode_write_options};
use replog_protocol::{Entity, HttpRequest, HttpResponse, Method};
use serde::Serialize;
use std::sync::Arc;

/// Context shared by every route handler.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// The repository being served.
    pub repository: Arc<Repository>,
    authorizer: Arc<dyn Authorizer>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(
        config: ServerConfig,
        repository: Arc<Repository>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            config,
            repository,
            authorizer,
        }
    }

    /// Checks that `request` may run `operation`.
    ///
    /// # Errors
    ///
    /// Returns the authorizer's rejection.
    pub fn authorize(&self, request: &HttpRequest, operation: &str) -> ServerResult<()> {
        self.authorizer.authorize(request, operation)
    }
}

/// A request after the base path has been stripped.
#[derive(Debug)]
pub struct RouteContext<'a> {
    /// The original request.
    pub request: &'a HttpRequest,
    /// Path relative to the base path.
    pub path: &'a str,
    /// Decoded query parameters, in order.
    pub query: &'a [(String, String)],
}

impl RouteContext<'_> {
    /// Returns the first value of a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        query::param(self.query, name)
    }

    fn method_not_allowed(&self) -> ServerError {
        ServerError::MethodNotAllowed {
            method: self.request.method.to_string(),
            path: self.path.to_string(),
        }
    }
}

/// A set of routes.
pub trait RouteHandler: Send + Sync {
    /// Handles the request, or returns `None` if no route matches its path.
    fn handle(&self, ctx: &RouteContext<'_>) -> Option<ServerResult<HttpResponse>>;
}

/// Ordered route handlers. The first handler that claims a path answers.
#[derive(Default)]
pub struct Router {
    handlers: Vec<Box<dyn RouteHandler>>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn push(&mut self, handler: impl RouteHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Registers a handler ahead of all existing ones.
    pub fn insert_first(&mut self, handler: impl RouteHandler + 'static) {
        self.handlers.insert(0, Box::new(handler));
    }

    /// Dispatches a request to the first matching handler.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotFound`] when no handler claims the path,
    /// or the handler's error.
    pub fn dispatch(&self, ctx: &RouteContext<'_>) -> ServerResult<HttpResponse> {
        self.handlers
            .iter()
            .find_map(|handler| handler.handle(ctx))
            .unwrap_or_else(|| Err(ServerError::NotFound(ctx.path.to_string())))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreIdBody {
    store_id: String,
}

#[derive(Serialize)]
struct DeletedBody {
    deleted: bool,
}

/// Generic entity routes: `/store`, `/ping` and `/items`.
pub struct RepositoryRoutes {
    context: Arc<HandlerContext>,
}

impl RepositoryRoutes {
    /// Creates the routes.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    fn store_id(&self, ctx: &RouteContext<'_>) -> ServerResult<HttpResponse> {
        if ctx.request.method != Method::Get {
            return Err(ctx.method_not_allowed());
        }
        self.context.authorize(ctx.request, operations::GET_STORE_ID)?;
        let store_id = self.context.repository.store_id()?;
        Ok(HttpResponse::ok_json(&StoreIdBody { store_id })?)
    }

    fn item(&self, ctx: &RouteContext<'_>) -> ServerResult<HttpResponse> {
        let id = ctx
            .param(query::ID)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServerError::InvalidRequest("missing 'id' parameter".into()))?;
        let repository = &self.context.repository;

        match ctx.request.method {
            Method::Get => {
                self.context.authorize(ctx.request, operations::GET_ITEM)?;
                let entity = repository
                    .get_by_id(id)?
                    .ok_or_else(|| ServerError::NotFound(format!("item '{id}'")))?;
                Ok(HttpResponse::ok_json(&entity)?)
            }
            Method::Put => {
                self.context.authorize(ctx.request, operations::PUT_ITEM)?;
                let entity: Entity = ctx.request.json()?;
                if entity.id != id {
                    return Err(ServerError::InvalidRequest(format!(
                        "body id '{}' does not match '{id}'",
                        entity.id
                    )));
                }
                let options = decode_write_options(ctx.query)?;
                repository.save(&entity, &options)?;
                Ok(HttpResponse::empty(204))
            }
            Method::Delete => {
                self.context.authorize(ctx.request, operations::DELETE_ITEM)?;
                let options = decode_write_options(ctx.query)?;
                let deleted = repository.delete(id, &options)?;
                Ok(HttpResponse::ok_json(&DeletedBody { deleted })?)
            }
            Method::Post => Err(ctx.method_not_allowed()),
        }
    }
}

impl RouteHandler for RepositoryRoutes {
    fn handle(&self, ctx: &RouteContext<'_>) -> Option<ServerResult<HttpResponse>> {
        match ctx.path {
            "/store" => Some(self.store_id(ctx)),
            "/ping" => Some(Ok(HttpResponse::empty(200))),
            "/items" => Some(self.item(ctx)),
            _ => None,
        }
    }
}
