//! Server build loading.
//!
//! The bundler produces a build containing the route manifest. In
//! production the build is created once at process start and memoized; in
//! development every request asks the loader again so route changes show
//! up without a restart. The request handler swaps the route table only
//! when the returned build is actually a new one.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::middleware::BoxFuture;
use crate::routes::RouteManifest;

/// Output of the build tooling, as far as the runtime is concerned.
#[derive(Debug, Clone, Default)]
pub struct ServerBuild {
    pub routes: RouteManifest,
}

impl ServerBuild {
    pub fn new(routes: RouteManifest) -> Self {
        Self { routes }
    }
}

/// Source of the current server build.
#[async_trait]
pub trait BuildProvider: Send + Sync {
    async fn load(&self) -> Result<Arc<ServerBuild>>;
}

/// Production provider: the build is fixed for the process lifetime.
pub struct StaticBuild {
    build: Arc<ServerBuild>,
}

impl StaticBuild {
    pub fn new(build: ServerBuild) -> Self {
        Self {
            build: Arc::new(build),
        }
    }
}

#[async_trait]
impl BuildProvider for StaticBuild {
    async fn load(&self) -> Result<Arc<ServerBuild>> {
        Ok(self.build.clone())
    }
}

/// Closure form of a build loader.
pub type BuildLoader = Arc<dyn Fn() -> BoxFuture<Result<Arc<ServerBuild>>> + Send + Sync>;

/// Development provider: re-invokes the loader on every request, so a dev
/// bundler can hand back a fresh module graph after each rebuild.
pub struct DevBuild {
    loader: BuildLoader,
}

impl DevBuild {
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<ServerBuild>>> + Send + 'static,
    {
        Self {
            loader: Arc::new(move || Box::pin(loader())),
        }
    }
}

#[async_trait]
impl BuildProvider for DevBuild {
    async fn load(&self) -> Result<Arc<ServerBuild>> {
        (self.loader)().await
    }
}
