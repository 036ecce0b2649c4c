//! Request entry point.
//!
//! One [`MiddlewareRequestHandler`] serves a process: it loads the current
//! build, keeps the route table in sync with it, and turns each inbound
//! request into exactly one response by driving the middleware chain
//! around the terminal handler.

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::context::ServerContext;
use crate::error::ServeError;
use crate::http_helpers::{Request, Response};
use crate::matcher::match_routes;
use crate::middleware::{BoxFuture, MiddlewareChain, Params, TerminalHandler};
use crate::routes::RouteTable;
use crate::server_build::{BuildProvider, ServerBuild};
use crate::single_fetch::{self, DataRequest};

/// Caller-supplied factory seeding the per-request context before the
/// chain starts.
pub type LoadContext = Arc<dyn Fn(Arc<Request>) -> BoxFuture<ServerContext> + Send + Sync>;

/// Build a load-context factory from an async closure.
pub fn load_context_fn<F, Fut>(f: F) -> LoadContext
where
    F: Fn(Arc<Request>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServerContext> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

pub struct MiddlewareRequestHandler {
    build: Arc<dyn BuildProvider>,
    route_table: RouteTable,
    current_build: ArcSwapOption<ServerBuild>,
    load_context: Option<LoadContext>,
    terminal: TerminalHandler,
}

impl MiddlewareRequestHandler {
    pub fn new(build: Arc<dyn BuildProvider>, terminal: TerminalHandler) -> Self {
        Self {
            build,
            route_table: RouteTable::new(),
            current_build: ArcSwapOption::empty(),
            load_context: None,
            terminal,
        }
    }

    pub fn with_load_context(mut self, load_context: LoadContext) -> Self {
        self.load_context = Some(load_context);
        self
    }

    /// Turn one request into one response.
    ///
    /// Host-agnostic: the adapters translate to and from the host's native
    /// representations on either side of this call. Errors returned here
    /// escaped chain reconciliation and belong on the host's error channel.
    pub async fn dispatch(&self, request: Request) -> Result<Response, ServeError> {
        let build = self.build.load().await.map_err(ServeError::BuildLoad)?;
        self.refresh_routes(&build);

        // middleware and the terminal handler must not see data URLs
        let data_request = DataRequest::detect(request.uri());
        let request = match data_request {
            Some(data) => {
                let canonical = data.canonical_uri(request.uri());
                request.with_uri(&canonical)
            }
            None => request,
        };
        let request = Arc::new(request);

        tracing::debug!(method = %request.method(), uri = %request.uri(), "dispatching request");

        let context = match &self.load_context {
            Some(factory) => factory(request.clone()).await,
            None => ServerContext::new(),
        };
        let context = Arc::new(context);

        let mut matches = match self.route_table.routes() {
            Some(root) => match_routes(&root, request.path()),
            None => Vec::new(),
        };
        if matches!(data_request, Some(DataRequest { is_root: true })) {
            // the synthetic root never appears in ordinary URL matches
            matches.truncate(1);
        }

        let params = Arc::new(
            matches
                .last()
                .map(|matched| matched.params.clone())
                .unwrap_or_else(Params::default),
        );
        let chain = MiddlewareChain::from_matches(&matches);
        let matches = Arc::new(matches);

        let response = chain
            .execute(request, params, context, matches, self.terminal.clone())
            .await?;

        // the data-request protocol signals redirects in-band
        let response = match data_request {
            Some(_) if response.is_redirect() => single_fetch::rewrite_redirect(response),
            _ => response,
        };
        Ok(response)
    }

    /// Rebuild the route table only when the provider handed back a new
    /// build. Static providers return the same `Arc` forever, so the table
    /// is built once; dev providers swap it after every rebuild.
    fn refresh_routes(&self, build: &Arc<ServerBuild>) {
        let changed = match self.current_build.load().as_ref() {
            Some(current) => !Arc::ptr_eq(current, build),
            None => true,
        };
        if changed {
            self.route_table.set_routes(&build.routes);
            self.current_build.store(Some(build.clone()));
        }
    }
}
