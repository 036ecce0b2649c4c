//! Error taxonomy for the request pipeline.
//!
//! Short-circuit responses and middleware failures are not errors at the
//! type level. They travel inside [`crate::middleware::Outcome`] and are
//! reconciled by the chain executor. The types here cover everything that
//! escapes that reconciliation.

use thiserror::Error;

/// Boxed error used at the adapter and body-stream boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to look up a value in the per-request context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// No value was stored under the token.
    #[error("context value not found for `{0}`")]
    NotFound(&'static str),
}

/// Failure while reading a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The one-shot body slot was already taken.
    #[error("request body already consumed")]
    AlreadyConsumed,

    /// The underlying byte stream failed.
    #[error("failed to read request body")]
    Read(#[source] BoxError),
}

/// Contract violations raised by the middleware chain executor.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain settled with neither a response nor a caught exit. A
    /// middleware swallowed the result of `next()` instead of returning it.
    #[error("middleware must return the response from next()")]
    MissingResponse,
}

/// Failures that escape the dispatch pipeline and surface to the host.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to load server build")]
    BuildLoad(#[source] anyhow::Error),

    #[error(transparent)]
    Chain(#[from] ChainError),
}
