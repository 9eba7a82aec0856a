//! Change-log read routes.
//!
//! `GET /history` returns the [`LogCursor`](replog_protocol::LogCursor) of
//! the served repository. `GET /history-items` decodes the find query and
//! returns a [`LogPage`](replog_protocol::LogPage).

use crate::auth::operations;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RouteContext, RouteHandler};
use replog_core::ChangeLog;
use replog_protocol::query::decode_find_query;
use replog_protocol::{HttpResponse, Method};
use std::sync::Arc;
use tracing::debug;

/// Serves the change log of the context's repository.
pub struct LogServerEndpoint {
    context: Arc<HandlerContext>,
}

impl LogServerEndpoint {
    /// Creates the endpoint.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    fn change_log(&self) -> ServerResult<&ChangeLog> {
        self.context
            .repository
            .change_log()
            .ok_or_else(|| ServerError::NotFound("change log is not enabled".into()))
    }

    fn get_cursor(&self, ctx: &RouteContext<'_>) -> ServerResult<HttpResponse> {
        self.context
            .authorize(ctx.request, operations::GET_LOG_CURSOR)?;
        let cursor = self.change_log()?.cursor()?;
        Ok(HttpResponse::ok_json(&cursor)?)
    }

    fn find_entries_after(&self, ctx: &RouteContext<'_>) -> ServerResult<HttpResponse> {
        self.context
            .authorize(ctx.request, operations::FIND_LOG_ENTRIES_AFTER)?;
        let (start_after, options) = decode_find_query(ctx.query)?;
        let page = self.change_log()?.find_entries_after(start_after, &options)?;
        debug!(
            start_after,
            returned = page.items.len(),
            last_log_sequence = page.last_log_sequence,
            "Served log entries"
        );
        Ok(HttpResponse::ok_json(&page)?)
    }
}

impl RouteHandler for LogServerEndpoint {
    fn handle(&self, ctx: &RouteContext<'_>) -> Option<ServerResult<HttpResponse>> {
        let route: fn(&Self, &RouteContext<'_>) -> ServerResult<HttpResponse> = match ctx.path {
            "/history" => Self::get_cursor,
            "/history-items" => Self::find_entries_after,
            _ => return None,
        };
        if ctx.request.method != Method::Get {
            return Some(Err(ServerError::MethodNotAllowed {
                method: ctx.request.method.to_string(),
                path: ctx.path.to_string(),
            }));
        }
        Some(route(self, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, TokenAuthorizer, TokenValidator};
    use crate::config::ServerConfig;
    use replog_core::{ChangeLogConfig, Repository};
    use replog_protocol::{Entity, HttpRequest, LogCursor, LogPage, WriteOptions};

    fn endpoint(repository: Arc<Repository>) -> LogServerEndpoint {
        let authorizer = TokenAuthorizer::new(TokenValidator::new(AuthConfig::new(b"k".to_vec())));
        LogServerEndpoint::new(Arc::new(HandlerContext::new(
            ServerConfig::default(),
            repository,
            Arc::new(authorizer),
        )))
    }

    fn signed(url: &str) -> HttpRequest {
        let token = TokenValidator::new(AuthConfig::new(b"k".to_vec()))
            .create_token("peer")
            .unwrap();
        HttpRequest::get(url).with_bearer(&token)
    }

    fn call(endpoint: &LogServerEndpoint, request: &HttpRequest) -> ServerResult<HttpResponse> {
        let path = request.path().unwrap();
        let query = request.query_pairs().unwrap();
        endpoint
            .handle(&RouteContext {
                request,
                path: &path,
                query: &query,
            })
            .unwrap()
    }

    fn logged_repository() -> Arc<Repository> {
        let repository =
            Arc::new(Repository::in_memory("people").with_change_log(ChangeLogConfig::default()));
        for id in ["p1", "p2", "p3"] {
            repository
                .save(&Entity::new("people", id), &WriteOptions::new())
                .unwrap();
        }
        repository
    }

    #[test]
    fn serves_cursor_and_entries() {
        let repository = logged_repository();
        let endpoint = endpoint(repository.clone());

        let cursor: LogCursor = call(&endpoint, &signed("/history")).unwrap().json().unwrap();
        assert_eq!(cursor.store_id, repository.store_id().unwrap());
        assert_eq!(cursor.last_log_sequence, 3);

        let page: LogPage = call(&endpoint, &signed("/history-items?startAfterSequence=1"))
            .unwrap()
            .json()
            .unwrap();
        let keys: Vec<_> = page.items.iter().map(|e| e.primary_key.as_str()).collect();
        assert_eq!(keys, ["p2", "p3"]);
        assert_eq!(page.last_log_sequence, 3);
    }

    #[test]
    fn rejects_unauthenticated_requests() {
        let endpoint = endpoint(logged_repository());
        let err = call(&endpoint, &HttpRequest::get("/history")).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn rejects_malformed_queries() {
        let endpoint = endpoint(logged_repository());
        let err = call(&endpoint, &signed("/history-items?startAfterSequence=abc")).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn missing_change_log_is_not_found() {
        let endpoint = endpoint(Arc::new(Repository::in_memory("plain")));
        let err = call(&endpoint, &signed("/history")).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
