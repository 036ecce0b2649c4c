use anyhow::{Context, Result};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use futures_util::TryStreamExt;

use crate::error::BoxError;
use crate::http_helpers::{self, Body, Headers};

use super::RouteAdapter;

pub struct AxumRouteAdapter;

impl RouteAdapter for AxumRouteAdapter {
    type Request = axum::extract::Request;
    type Response = axum::response::Response;

    async fn adapt_request(request: Self::Request) -> Result<http_helpers::Request> {
        let (parts, body) = request.into_parts();

        let uri = parts
            .uri
            .path_and_query()
            .map(|target| target.as_str().to_string())
            .unwrap_or_else(|| parts.uri.to_string());

        // repeated header names stay repeated
        let mut headers = Headers::new();
        for (name, value) in parts.headers.iter() {
            let value = value
                .to_str()
                .with_context(|| format!("header `{name}` is not valid UTF-8"))?;
            headers.append(name.as_str(), value);
        }

        let stream = body
            .into_data_stream()
            .map_err(|error| Box::new(error) as BoxError);

        Ok(http_helpers::Request::new(parts.method.as_str(), &uri)
            .with_headers(headers)
            .with_body(Body::Stream(Box::pin(stream))))
    }

    fn adapt_response(response: http_helpers::Response) -> Result<Self::Response> {
        let status = StatusCode::from_u16(response.status)
            .with_context(|| format!("invalid response status {}", response.status))?;

        let body = match response.body {
            Body::Empty => axum::body::Body::empty(),
            Body::Text(text) => axum::body::Body::from(text),
            Body::Json(json) => {
                let bytes = serde_json::to_vec(&json).context("failed to serialize JSON body")?;
                axum::body::Body::from(bytes)
            }
            Body::Bytes(bytes) => axum::body::Body::from(bytes),
            Body::Stream(stream) => axum::body::Body::from_stream(stream),
        };

        let mut native = axum::response::Response::builder()
            .status(status)
            .body(body)
            .context("failed to build response")?;

        for (name, value) in response.headers.iter() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name `{name}`"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header `{name}`"))?;
            // append, not insert: repeated Set-Cookie must survive
            native.headers_mut().append(name, value);
        }

        Ok(native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_adapt_request_preserves_repeated_headers() {
        let native = axum::extract::Request::builder()
            .method("POST")
            .uri("http://localhost/submit?x=1")
            .header("Cookie", "a=1")
            .header("Cookie", "b=2")
            .body(axum::body::Body::from("payload"))
            .unwrap();

        let request = AxumRouteAdapter::adapt_request(native).await.unwrap();

        assert_eq!(request.method(), "POST");
        assert_eq!(request.uri(), "/submit?x=1");
        assert_eq!(request.headers().get_all("cookie"), vec!["a=1", "b=2"]);
        assert_eq!(request.text().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_adapt_response_expands_multi_value_headers() {
        let response = http_helpers::Response::text("ok")
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2");

        let native = AxumRouteAdapter::adapt_response(response).unwrap();

        assert_eq!(native.status(), StatusCode::OK);
        let cookies: Vec<_> = native
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_adapt_response_rejects_invalid_status() {
        let response = http_helpers::Response::new().with_status(1000);
        assert!(AxumRouteAdapter::adapt_response(response).is_err());
    }
}
