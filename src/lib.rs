//! Middleware-enabled server runtime for nested-route web apps on axum.
//!
//! The runtime sits between an axum host and a framework's terminal
//! render/loader/action dispatcher. For each request it matches the nested
//! route tree, flattens the middleware declared by the matched frames, and
//! drives them as a cooperative chain around the terminal handler,
//! reconciling normal returns, short-circuit responses, and failures into
//! exactly one outgoing response.

pub mod adapter;
pub mod context;
pub mod error;
pub mod handler;
pub mod http_helpers;
pub mod matcher;
pub mod middleware;
pub mod routes;
pub mod server_build;
pub mod session;
pub mod single_fetch;

pub use adapter::{AxumAdapter, AxumRouteAdapter, RouteAdapter};
pub use context::{ServerContext, Token};
pub use error::{BodyError, BoxError, ChainError, ContextError, ServeError};
pub use handler::{LoadContext, MiddlewareRequestHandler, load_context_fn};
pub use http_helpers::{Body, Headers, IntoResponse, Request, Response};
pub use matcher::{RouteMatch, match_routes};
pub use middleware::{
    FunctionalMiddleware, Middleware, MiddlewareArgs, MiddlewareChain, MiddlewareFn, Next, Outcome,
    Params, TerminalHandler, middleware_fn, terminal_fn,
};
pub use routes::{ROOT_ROUTE_ID, Route, RouteDefinition, RouteManifest, RouteModule, RouteTable};
pub use server_build::{BuildProvider, DevBuild, ServerBuild, StaticBuild};
pub use session::{
    MemorySessionStorage, Session, SessionData, SessionMiddleware, SessionStorage, SharedSession,
    session_token,
};

// Re-export dependencies middleware authors need at the call site.
pub use async_trait::async_trait;
pub use rustc_hash::FxHashMap;
