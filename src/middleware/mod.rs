//! Middleware contract and chain executor.
//!
//! A middleware runs code around the rest of the chain by calling
//! [`Next::run`] and returning what it yields. Early exits are values, not
//! exceptions: the [`Outcome`] variants replace the original runtime's
//! thrown responses and errors, and the executor pattern-matches on them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::context::ServerContext;
use crate::http_helpers::{Request, Response};
use crate::matcher::RouteMatch;

mod chain;
pub use chain::{MiddlewareChain, Next};

/// Boxed future used across the chain's dynamic call sites.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Route params of the deepest matched frame.
pub type Params = FxHashMap<String, String>;

/// What one link of the chain settles with.
#[derive(Debug)]
pub enum Outcome {
    /// Normal return: the response from `next()`, possibly post-processed,
    /// or a response the middleware produced without delegating (which
    /// aborts everything downstream).
    Respond(Response),

    /// Terminate the chain now with this response, typically a redirect.
    /// Downstream links never run.
    ShortCircuit(Response),

    /// Terminate the chain now. Surfaced to the client as a JSON 500.
    Failure(anyhow::Error),

    /// A downstream link already settled the chain; nothing to contribute.
    /// Returned when `next()` yields no response.
    Interrupted,
}

impl From<Option<Response>> for Outcome {
    fn from(response: Option<Response>) -> Self {
        match response {
            Some(response) => Outcome::Respond(response),
            None => Outcome::Interrupted,
        }
    }
}

/// One link of the chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Run code around the rest of the chain. Implementations must either
    /// call `args.next.run()` and return its outcome, or settle the request
    /// themselves with `Respond`, `ShortCircuit`, or `Failure`.
    async fn handle(&self, args: MiddlewareArgs) -> Outcome;
}

/// Arguments handed to every middleware invocation.
pub struct MiddlewareArgs {
    pub request: Arc<Request>,
    pub params: Arc<Params>,
    pub context: Arc<ServerContext>,
    pub matches: Arc<Vec<RouteMatch>>,
    pub next: Next,
}

/// Closure form of [`Middleware`].
pub type MiddlewareFn = Arc<dyn Fn(MiddlewareArgs) -> BoxFuture<Outcome> + Send + Sync>;

/// Wrapper turning a [`MiddlewareFn`] into a [`Middleware`].
pub struct FunctionalMiddleware {
    handler: MiddlewareFn,
}

impl FunctionalMiddleware {
    pub fn new(handler: MiddlewareFn) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Middleware for FunctionalMiddleware {
    async fn handle(&self, args: MiddlewareArgs) -> Outcome {
        (self.handler)(args).await
    }
}

/// Build a middleware from an async closure.
pub fn middleware_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(MiddlewareArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(FunctionalMiddleware::new(Arc::new(move |args| {
        Box::pin(f(args))
    })))
}

/// The framework's render/loader/action dispatcher, treated as the last
/// link of the chain. Invoked when the middleware list is exhausted.
pub type TerminalHandler =
    Arc<dyn Fn(Arc<Request>, Arc<ServerContext>) -> BoxFuture<Outcome> + Send + Sync>;

/// Build a terminal handler from an async closure.
pub fn terminal_fn<F, Fut>(f: F) -> TerminalHandler
where
    F: Fn(Arc<Request>, Arc<ServerContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(move |request, context| Box::pin(f(request, context)))
}
