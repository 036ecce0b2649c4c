//! Route manifest and the process-wide route tree cache.
//!
//! The bundler hands the runtime a flat manifest of `{id, parent_id,
//! module}` entries. [`RouteTable::set_routes`] converts it into a
//! parent-linked tree rooted at [`ROOT_ROUTE_ID`] and swaps it in
//! wholesale, so concurrent readers always see either the old or the fully
//! built tree.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use rustc_hash::FxHashMap;

use crate::middleware::Middleware;

/// Id of the synthetic root frame. Always present in the built tree, even
/// when the manifest omits it.
pub const ROOT_ROUTE_ID: &str = "root";

/// Route module surface the runtime cares about: the ordered middleware the
/// route declares. Populated at manifest construction time, not looked up
/// dynamically per request.
#[derive(Clone, Default)]
pub struct RouteModule {
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_middleware(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middleware }
    }
}

impl fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteModule")
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// One flat manifest entry.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub id: String,
    pub parent_id: Option<String>,
    pub path: Option<String>,
    pub index: bool,
    pub module: RouteModule,
}

impl RouteDefinition {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            parent_id: None,
            path: None,
            index: false,
            module: RouteModule::new(),
        }
    }

    pub fn parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.module = RouteModule::with_middleware(middleware);
        self
    }
}

/// Flat `id -> definition` mapping produced by the build. Declaration order
/// is preserved; sibling routes match in the order they were inserted.
#[derive(Debug, Clone, Default)]
pub struct RouteManifest {
    entries: FxHashMap<String, RouteDefinition>,
    order: Vec<String>,
}

impl RouteManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: RouteDefinition) {
        if !self.entries.contains_key(&definition.id) {
            self.order.push(definition.id.clone());
        }
        self.entries.insert(definition.id.clone(), definition);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn route(mut self, definition: RouteDefinition) -> Self {
        self.insert(definition);
        self
    }

    pub fn get(&self, id: &str) -> Option<&RouteDefinition> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

/// One node of the built route tree.
#[derive(Clone)]
pub struct Route {
    pub id: String,
    pub path: Option<String>,
    pub index: bool,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub children: Vec<Route>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("index", &self.index)
            .field("middleware", &self.middleware.len())
            .field("children", &self.children)
            .finish()
    }
}

/// Process-wide cache for the current route tree.
///
/// Replaced wholesale on every build load; never mutated incrementally.
#[derive(Default)]
pub struct RouteTable {
    tree: ArcSwapOption<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rebuild from the manifest. Children are collected recursively
    /// by `parent_id` starting from the root; entries whose parent chain
    /// never reaches the root are dropped.
    pub fn set_routes(&self, manifest: &RouteManifest) {
        let root = match manifest.get(ROOT_ROUTE_ID) {
            Some(definition) => build_route(definition, manifest),
            None => Route {
                id: ROOT_ROUTE_ID.to_string(),
                path: None,
                index: false,
                middleware: Vec::new(),
                children: collect_children(ROOT_ROUTE_ID, manifest),
            },
        };
        self.tree.store(Some(Arc::new(root)));
    }

    /// The current tree, or `None` when no build has been loaded yet.
    pub fn routes(&self) -> Option<Arc<Route>> {
        self.tree.load_full()
    }
}

fn build_route(definition: &RouteDefinition, manifest: &RouteManifest) -> Route {
    Route {
        id: definition.id.clone(),
        path: definition.path.clone(),
        index: definition.index,
        middleware: definition.module.middleware.clone(),
        children: collect_children(&definition.id, manifest),
    }
}

fn collect_children(parent_id: &str, manifest: &RouteManifest) -> Vec<Route> {
    manifest
        .iter()
        .filter(|definition| definition.parent_id.as_deref() == Some(parent_id))
        .map(|definition| build_route(definition, manifest))
        .collect()
}
