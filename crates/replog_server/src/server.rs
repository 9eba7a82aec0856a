//! The store server.

use crate::auth::{AllowAll, Authorizer, DenyAll, TokenAuthorizer, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RepositoryRoutes, RouteContext, Router};
use crate::log_endpoint::LogServerEndpoint;
use replog_core::Repository;
use replog_protocol::{HttpRequest, HttpResponse, HttpService};
use std::sync::Arc;
use tracing::{debug, warn};

/// Serves one repository to remote peers.
///
/// The change-log routes are registered only when the repository has a
/// change log, and always ahead of the generic entity routes.
///
/// # Example
///
/// ```
/// use replog_core::{ChangeLogConfig, Repository};
/// use replog_protocol::{HttpRequest, HttpService};
/// use replog_server::{ServerConfig, StoreServer};
/// use std::sync::Arc;
///
/// let repo = Repository::in_memory("people").with_change_log(ChangeLogConfig::default());
/// let repo = Arc::new(repo);
/// let server = StoreServer::new(ServerConfig::default().with_base_path("/api/people"), repo);
///
/// let response = server.handle(&HttpRequest::get("/api/people/history"));
/// assert_eq!(response.status, 200);
/// ```
pub struct StoreServer {
    context: Arc<HandlerContext>,
    router: Router,
}

impl StoreServer {
    /// Creates a server. Requests are checked with a [`TokenAuthorizer`]
    /// when `config` requires authentication, and allowed otherwise. If
    /// authentication is required without token settings, every request is
    /// rejected.
    pub fn new(config: ServerConfig, repository: Arc<Repository>) -> Self {
        let authorizer: Arc<dyn Authorizer> = match (&config.auth, config.require_auth) {
            (Some(auth), true) => {
                Arc::new(TokenAuthorizer::new(TokenValidator::new(auth.clone())))
            }
            (None, true) => {
                warn!("authentication is required but not configured; rejecting all requests");
                Arc::new(DenyAll)
            }
            (_, false) => Arc::new(AllowAll),
        };
        Self::with_authorizer(config, repository, authorizer)
    }

    /// Creates a server with a custom authorizer.
    pub fn with_authorizer(
        config: ServerConfig,
        repository: Arc<Repository>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let logged = repository.change_log().is_some();
        let context = Arc::new(HandlerContext::new(config, repository, authorizer));

        let mut router = Router::new();
        router.push(RepositoryRoutes::new(Arc::clone(&context)));
        if logged {
            router.insert_first(LogServerEndpoint::new(Arc::clone(&context)));
        }

        Self { context, router }
    }

    /// Returns the served repository.
    pub fn repository(&self) -> &Arc<Repository> {
        &self.context.repository
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    fn route(&self, request: &HttpRequest) -> ServerResult<HttpResponse> {
        let path = request.path()?;
        let path = self
            .context
            .config
            .route_path(&path)
            .ok_or_else(|| ServerError::NotFound(path.clone()))?;
        let query = request.query_pairs()?;

        self.router.dispatch(&RouteContext {
            request,
            path,
            query: &query,
        })
    }
}

impl HttpService for StoreServer {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        match self.route(request) {
            Ok(response) => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status,
                    "Handled request"
                );
                response
            }
            Err(err) => {
                let status = err.status_code();
                if err.is_server_error() {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        error = %err,
                        "Request failed"
                    );
                } else {
                    debug!(
                        method = %request.method,
                        url = %request.url,
                        status,
                        error = %err,
                        "Request rejected"
                    );
                }
                HttpResponse::json_with_status(status, &err.body())
                    .unwrap_or_else(|_| HttpResponse::new(status, err.to_string().into_bytes()))
            }
        }
    }
}
