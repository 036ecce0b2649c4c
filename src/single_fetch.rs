//! Data sub-request handling.
//!
//! Client-side revalidation fetches data through special URLs: the page
//! path with a reserved suffix, or a reserved root-data path. Middleware
//! and the terminal handler must never see those URLs, so the path is
//! rewritten to its canonical page form before matching. Redirect
//! responses to data requests are re-encoded in-band as a serialized
//! stream envelope instead of HTTP redirect semantics; the client reads
//! the target out of the body.
//!
//! The policy here is easy to get subtly wrong: stripping the suffix must
//! also drop the reserved `index` query parameter (it disambiguates an
//! index route from its parent during matching), and the root-data path
//! bypasses normal matching entirely because the synthetic root frame
//! never appears in ordinary URL matches.

use crate::http_helpers::{Body, Response};

/// Suffix marking a data sub-request for a page path.
pub const DATA_SUFFIX: &str = ".data";

/// Data sub-request path for the root route.
pub const ROOT_DATA_PATH: &str = "/_root.data";

/// Query parameter distinguishing an index route from its parent.
pub const INDEX_PARAM: &str = "index";

/// Content type of the serialized stream envelope.
pub const TURBO_STREAM_CONTENT_TYPE: &str = "text/x-turbo; charset=utf-8";

/// Marker header telling the client this is a framework response.
pub const MARKER_HEADER: &str = "X-Remix-Response";
pub const MARKER_VALUE: &str = "yes";

/// A detected data sub-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequest {
    /// The request targets the root-data path; matching is restricted to
    /// exactly the root frame.
    pub is_root: bool,
}

impl DataRequest {
    /// Detect whether `uri` denotes a data sub-request.
    pub fn detect(uri: &str) -> Option<DataRequest> {
        let path = uri.split('?').next().unwrap_or(uri);
        if path == ROOT_DATA_PATH {
            Some(DataRequest { is_root: true })
        } else if path.ends_with(DATA_SUFFIX) {
            Some(DataRequest { is_root: false })
        } else {
            None
        }
    }

    /// Rewrite `uri` to the canonical page form used for matching,
    /// middleware, and the terminal handler.
    pub fn canonical_uri(&self, uri: &str) -> String {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (uri, None),
        };

        let path = if self.is_root {
            "/".to_string()
        } else {
            let stripped = path.strip_suffix(DATA_SUFFIX).unwrap_or(path);
            if stripped.is_empty() {
                "/".to_string()
            } else {
                stripped.to_string()
            }
        };

        match query.map(strip_index_param) {
            Some(query) if !query.is_empty() => format!("{path}?{query}"),
            _ => path,
        }
    }
}

/// Drop the reserved `index` parameter, keeping everything else intact.
/// The parameter may appear bare (`?index`) or with a value (`?index=`).
fn strip_index_param(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or(pair);
            !pair.is_empty() && key != INDEX_PARAM
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Re-encode a redirect response as the in-band stream envelope: status
/// forced to 200, the redirect's status and location embedded in the body,
/// and the `Location` header removed.
pub fn rewrite_redirect(response: Response) -> Response {
    let status = response.status;
    let location = response.headers.get("Location").unwrap_or("").to_string();

    let body = format!(
        "[[\"SingleFetchRedirect\",1],{{\"2\":3,\"4\":5,\"6\":7,\"8\":7}},\
         \"redirect\",\"{location}\",\"status\",{status},\"revalidate\",false,\"reload\"]"
    );

    let mut headers = response.headers;
    headers.set("Content-Type", TURBO_STREAM_CONTENT_TYPE);
    headers.set(MARKER_HEADER, MARKER_VALUE);
    headers.remove("Location");

    Response {
        status: 200,
        headers,
        body: Body::Text(body),
    }
}
