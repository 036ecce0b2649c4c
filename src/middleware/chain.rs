use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;

use crate::context::ServerContext;
use crate::error::ChainError;
use crate::http_helpers::{Request, Response};
use crate::matcher::RouteMatch;

use super::{BoxFuture, Middleware, MiddlewareArgs, Outcome, Params, TerminalHandler};

/// Cursor and last-caught slots for one request's chain run.
#[derive(Default)]
struct ChainState {
    cursor: usize,
    caught_response: Option<Response>,
    caught_error: Option<anyhow::Error>,
}

/// Everything one request's chain shares between links.
struct ChainShared {
    middleware: Vec<Arc<dyn Middleware>>,
    state: Mutex<ChainState>,
    request: Arc<Request>,
    params: Arc<Params>,
    context: Arc<ServerContext>,
    matches: Arc<Vec<RouteMatch>>,
    terminal: TerminalHandler,
}

impl ChainShared {
    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Continuation handed to every middleware.
///
/// Each `run` reads the link at the cursor, advances it, and invokes the
/// link (or the terminal handler once the list is exhausted). A
/// `ShortCircuit` or `Failure` outcome forces the cursor to the end and is
/// remembered in the caught slots; callers then see `None` and are expected
/// to pass [`Outcome::Interrupted`] back up.
#[derive(Clone)]
pub struct Next {
    shared: Arc<ChainShared>,
}

impl Next {
    /// Invoke the rest of the chain and return its response, or `None` when
    /// a downstream link already settled the request.
    pub fn run(&self) -> BoxFuture<Option<Response>> {
        let shared = self.shared.clone();
        Box::pin(async move {
            let link = {
                let mut state = shared.lock();
                let index = state.cursor;
                state.cursor += 1;
                shared.middleware.get(index).cloned()
            };

            let outcome = match link {
                Some(middleware) => {
                    let args = MiddlewareArgs {
                        request: shared.request.clone(),
                        params: shared.params.clone(),
                        context: shared.context.clone(),
                        matches: shared.matches.clone(),
                        next: Next {
                            shared: shared.clone(),
                        },
                    };
                    middleware.handle(args).await
                }
                None => (shared.terminal)(shared.request.clone(), shared.context.clone()).await,
            };

            match outcome {
                Outcome::Respond(response) => Some(response),
                Outcome::ShortCircuit(response) => {
                    let mut state = shared.lock();
                    state.cursor = shared.middleware.len();
                    state.caught_response = Some(response);
                    None
                }
                Outcome::Failure(error) => {
                    let mut state = shared.lock();
                    state.cursor = shared.middleware.len();
                    state.caught_error = Some(error);
                    None
                }
                Outcome::Interrupted => None,
            }
        })
    }
}

/// Ordered middleware list for one request, executed FIFO around the
/// terminal handler. Rebuilt per request from the matched routes; route
/// trees can change between dev rebuilds, so nothing is cached across
/// requests.
#[derive(Default)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten middleware declared by matched frames, root to leaf. The
    /// first collected middleware is the outermost wrapper.
    pub fn from_matches(matches: &[RouteMatch]) -> Self {
        let middleware = matches
            .iter()
            .flat_map(|matched| matched.middleware.iter().cloned())
            .collect();
        Self { middleware }
    }

    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Drive the chain to a single response.
    ///
    /// Exit reconciliation: a caught error becomes a JSON 500, but a caught
    /// short-circuit response settles the request even when an error was
    /// also caught on the way out. A chain that settles with neither is a
    /// contract violation and fails loudly.
    pub async fn execute(
        &self,
        request: Arc<Request>,
        params: Arc<Params>,
        context: Arc<ServerContext>,
        matches: Arc<Vec<RouteMatch>>,
        terminal: TerminalHandler,
    ) -> Result<Response, ChainError> {
        let shared = Arc::new(ChainShared {
            middleware: self.middleware.clone(),
            state: Mutex::new(ChainState::default()),
            request,
            params,
            context,
            matches,
            terminal,
        });

        let next = Next {
            shared: shared.clone(),
        };
        let mut response = next.run().await;

        let (caught_response, caught_error) = {
            let mut state = shared.lock();
            (state.caught_response.take(), state.caught_error.take())
        };

        if let Some(error) = caught_error {
            tracing::error!(error = %error, "middleware chain failed");
            response = Some(error_response(&error));
        }
        if let Some(short_circuit) = caught_response {
            response = Some(short_circuit);
        }

        response.ok_or(ChainError::MissingResponse)
    }
}

fn error_response(error: &anyhow::Error) -> Response {
    Response::json(json!({ "error": error.to_string() })).with_status(500)
}
