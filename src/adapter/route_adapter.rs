use std::future::Future;

use anyhow::Result;

use crate::http_helpers;

/// Translation between a host server's native request/response types and
/// the framework's immutable value types.
pub trait RouteAdapter {
    type Request;
    type Response;

    /// Convert the host's request into the framework's value, wrapping the
    /// body as a lazily-read stream. The native request is consumed; its
    /// body must not be touched before this call.
    fn adapt_request(
        request: Self::Request,
    ) -> impl Future<Output = Result<http_helpers::Request>> + Send;

    /// Convert an outgoing response into the host's representation.
    /// Multi-value headers are written as repeated low-level headers, never
    /// comma-joined; stream bodies are forwarded without buffering.
    fn adapt_response(response: http_helpers::Response) -> Result<Self::Response>;
}
