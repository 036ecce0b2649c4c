//! Nested-route matching.
//!
//! Consumed by the dispatch pipeline only: given the built route tree and a
//! request path, produce the ordered list of matched frames from root to
//! leaf. Deliberately lean; this crate is not a routing engine.
//!
//! Segment grammar: static segments compare case-insensitively, `:name`
//! captures one segment, a trailing `*` splat captures whatever remains,
//! routes without a path match without consuming anything, and `index`
//! routes match an exhausted path. The deepest successful branch wins;
//! sibling ties resolve to the first declaration.

use std::sync::Arc;

use crate::middleware::{Middleware, Params};
use crate::routes::Route;

/// One matched frame, root to leaf.
#[derive(Clone)]
pub struct RouteMatch {
    pub id: String,
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Params accumulated from the root down to this frame. Deeper captures
    /// win on name collisions.
    pub params: Params,
    /// Portion of the request path consumed up to this frame.
    pub pathname: String,
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("pathname", &self.pathname)
            .finish()
    }
}

/// Match `path` against the tree. Empty when nothing matches.
pub fn match_routes(root: &Route, path: &str) -> Vec<RouteMatch> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some(frames) = descend(root, &segments) else {
        return Vec::new();
    };

    let mut params = Params::default();
    let mut consumed_total = 0;
    let mut matches = Vec::with_capacity(frames.len());
    for frame in frames {
        params.extend(frame.params);
        consumed_total += frame.consumed;
        let pathname = if consumed_total == 0 {
            "/".to_string()
        } else {
            format!("/{}", segments[..consumed_total].join("/"))
        };
        matches.push(RouteMatch {
            id: frame.route.id.clone(),
            middleware: frame.route.middleware.clone(),
            params: params.clone(),
            pathname,
        });
    }
    matches
}

struct Frame<'a> {
    route: &'a Route,
    params: Vec<(String, String)>,
    consumed: usize,
}

/// Match this route's own pattern, then find the deepest branch through its
/// children that consumes the rest of the path.
fn descend<'a>(route: &'a Route, segments: &[&'a str]) -> Option<Vec<Frame<'a>>> {
    let (rest, params, consumed) = consume(route.path.as_deref(), segments)?;
    let frame = Frame {
        route,
        params,
        consumed,
    };

    // index routes are leaves and only match an exhausted path
    if route.index {
        return rest.is_empty().then(|| vec![frame]);
    }

    let mut best: Option<Vec<Frame<'a>>> = None;
    for child in &route.children {
        if let Some(frames) = descend(child, &rest) {
            let deeper = best
                .as_ref()
                .is_none_or(|current| frames.len() > current.len());
            if deeper {
                best = Some(frames);
            }
        }
    }

    if let Some(mut frames) = best {
        frames.insert(0, frame);
        return Some(frames);
    }
    rest.is_empty().then(|| vec![frame])
}

/// Consume this route's pattern from the head of `segments`. Returns the
/// remaining segments, captured params, and the number consumed.
fn consume<'a>(
    pattern: Option<&str>,
    segments: &[&'a str],
) -> Option<(Vec<&'a str>, Vec<(String, String)>, usize)> {
    let Some(pattern) = pattern else {
        return Some((segments.to_vec(), Vec::new(), 0));
    };

    let mut params = Vec::new();
    let mut remaining = segments;
    let mut consumed = 0;

    for part in pattern.split('/').filter(|s| !s.is_empty()) {
        if part == "*" {
            params.push(("*".to_string(), remaining.join("/")));
            consumed += remaining.len();
            remaining = &[];
            break;
        }
        let (&segment, rest) = remaining.split_first()?;
        if let Some(name) = part.strip_prefix(':') {
            params.push((name.to_string(), segment.to_string()));
        } else if !part.eq_ignore_ascii_case(segment) {
            return None;
        }
        remaining = rest;
        consumed += 1;
    }

    Some((remaining.to_vec(), params, consumed))
}
