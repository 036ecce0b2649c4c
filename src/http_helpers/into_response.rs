use serde_json::Value;

use super::{Body, Response};

/// Conversion into the framework's [`Response`] value.
///
/// Lets terminal handlers and demos return plain payloads without building
/// the response by hand.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(&self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response {
        Response::json(self)
    }
}

impl IntoResponse for u16 {
    fn into_response(self) -> Response {
        Response::new().with_status(self)
    }
}

impl IntoResponse for (u16, Body) {
    fn into_response(self) -> Response {
        Response::new().with_status(self.0).with_body(self.1)
    }
}
