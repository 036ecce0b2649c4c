use serde_json::Value;

use super::{Body, Headers};

/// Outgoing response value produced by the chain and sent by the adapter.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    pub fn text(text: &str) -> Self {
        let mut response = Self::new();
        response
            .headers
            .set("Content-Type", "text/plain; charset=utf-8");
        response.body = Body::Text(text.to_string());
        response
    }

    pub fn json(value: Value) -> Self {
        let mut response = Self::new();
        response.headers.set("Content-Type", "application/json");
        response.body = Body::Json(value);
        response
    }

    /// 302 redirect to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::redirect_with_status(location, 302)
    }

    pub fn redirect_with_status(location: &str, status: u16) -> Self {
        let mut response = Self::new();
        response.status = status;
        response.headers.set("Location", location);
        response
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_sets_content_type() {
        let response = Response::json(json!({ "ok": true }));

        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("Content-Type"), Some("application/json"));
        assert!(matches!(response.body, Body::Json(_)));
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/login");

        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("Location"), Some("/login"));
        assert!(response.is_redirect());

        let permanent = Response::redirect_with_status("/moved", 301);
        assert!(permanent.is_redirect());
        assert!(!Response::new().is_redirect());
    }
}
