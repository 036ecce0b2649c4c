use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::handler::MiddlewareRequestHandler;

use super::{AxumRouteAdapter, RouteAdapter};

/// Mounts a [`MiddlewareRequestHandler`] as an axum fallback service, the
/// equivalent of a catch-all route. Binding a listener and serving the
/// router stays with the host application.
#[derive(Clone)]
pub struct AxumAdapter {
    handler: Arc<MiddlewareRequestHandler>,
}

impl AxumAdapter {
    pub fn new(handler: MiddlewareRequestHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn into_router(self) -> Router {
        let handler = self.handler;
        Router::new().fallback(move |request: axum::extract::Request| {
            let handler = handler.clone();
            async move { handle(handler, request).await }
        })
    }
}

async fn handle(
    handler: Arc<MiddlewareRequestHandler>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let request = match AxumRouteAdapter::adapt_request(request).await {
        Ok(request) => request,
        Err(error) => return failure(&error),
    };
    let response = match handler.dispatch(request).await {
        Ok(response) => response,
        Err(error) => return failure(&error.into()),
    };
    match AxumRouteAdapter::adapt_response(response) {
        Ok(native) => native,
        Err(error) => failure(&error),
    }
}

/// axum services are infallible, so anything that escapes reconciliation
/// is logged and collapsed into a plain 500 here.
fn failure(error: &anyhow::Error) -> axum::response::Response {
    tracing::error!(error = %error, "request pipeline failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
