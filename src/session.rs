//! Session collaborator: a pluggable cookie-session interface plus the
//! middleware that auto-commits mutated sessions.
//!
//! Storage mechanics live behind [`SessionStorage`]; the runtime only
//! cares about reading a session from the `Cookie` header and writing a
//! `Set-Cookie` value back when the session was touched.

use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::context::Token;
use crate::middleware::{Middleware, MiddlewareArgs, Outcome};

/// Raw session payload.
pub type SessionData = FxHashMap<String, Value>;

/// A session is shared through the context so downstream middleware and
/// the terminal handler can mutate it; the commit happens on the way out.
pub type SharedSession = Arc<Mutex<Session>>;

static SESSION_TOKEN: LazyLock<Token<SharedSession>> = LazyLock::new(|| Token::new("session"));

/// Context token under which [`SessionMiddleware`] stores the session.
pub fn session_token() -> Token<SharedSession> {
    *SESSION_TOKEN
}

fn flash_key(key: &str) -> String {
    format!("__flash_{key}__")
}

/// One request's session. Mutations mark it dirty so the middleware knows
/// to commit it back to the store.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: String,
    data: SessionData,
    dirty: bool,
    destroyed: bool,
}

impl Session {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn from_data(id: &str, data: SessionData) -> Self {
        Self {
            id: id.to_string(),
            data,
            dirty: false,
            destroyed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read a value. A flash value is consumed by the first read.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value.clone());
        }
        let flashed = self.data.remove(&flash_key(key));
        if flashed.is_some() {
            self.dirty = true;
        }
        flashed
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
        self.dirty = true;
    }

    pub fn unset(&mut self, key: &str) {
        self.data.remove(key);
        self.dirty = true;
    }

    /// Store a value that survives until its first read.
    pub fn flash(&mut self, key: &str, value: Value) {
        self.data.insert(flash_key(key), value);
        self.dirty = true;
    }

    pub fn destroy(&mut self) {
        self.data.clear();
        self.destroyed = true;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Snapshot of the raw payload, usable for external dirty-checking.
    pub fn data(&self) -> SessionData {
        self.data.clone()
    }
}

/// Pluggable session store.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Resolve the session for a request's `Cookie` header. Always returns
    /// a session; an unknown or absent cookie yields a fresh one.
    async fn get_session(&self, cookie_header: Option<&str>) -> Session;

    /// Persist the session and return the `Set-Cookie` value.
    async fn commit_session(&self, session: &Session) -> String;

    /// Drop the session and return an expiring `Set-Cookie` value.
    async fn destroy_session(&self, session: &Session) -> String;
}

/// In-memory store keyed by uuid session ids. The cookie carries only the
/// id; payloads stay in the process.
pub struct MemorySessionStorage {
    cookie_name: String,
    sessions: Mutex<FxHashMap<String, SessionData>>,
}

impl MemorySessionStorage {
    pub fn new(cookie_name: &str) -> Self {
        Self {
            cookie_name: cookie_name.to_string(),
            sessions: Mutex::new(FxHashMap::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<String, SessionData>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get_session(&self, cookie_header: Option<&str>) -> Session {
        if let Some(id) = cookie_header.and_then(|header| cookie_value(header, &self.cookie_name)) {
            if let Some(data) = self.lock().get(&id).cloned() {
                return Session::from_data(&id, data);
            }
        }
        Session::new(&Uuid::new_v4().to_string())
    }

    async fn commit_session(&self, session: &Session) -> String {
        self.lock()
            .insert(session.id().to_string(), session.data());
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            session.id()
        )
    }

    async fn destroy_session(&self, session: &Session) -> String {
        self.lock().remove(session.id());
        format!(
            "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0",
            self.cookie_name
        )
    }
}

/// First value for `name` in a `Cookie` header.
fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Reads the session before the chain runs, parks it in the context under
/// [`session_token`], and commits it after `next()` when it was mutated,
/// appending the `Set-Cookie` header to the outgoing response.
pub struct SessionMiddleware {
    storage: Arc<dyn SessionStorage>,
}

impl SessionMiddleware {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(&self, args: MiddlewareArgs) -> Outcome {
        let session = self
            .storage
            .get_session(args.request.header("Cookie"))
            .await;
        let session: SharedSession = Arc::new(Mutex::new(session));
        args.context.set(session_token(), session.clone());

        let Some(mut response) = args.next.run().await else {
            return Outcome::Interrupted;
        };

        // snapshot to avoid holding the lock across the store's await
        let snapshot = {
            let guard = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.clone()
        };
        if snapshot.is_destroyed() {
            let cookie = self.storage.destroy_session(&snapshot).await;
            response.headers.append("Set-Cookie", &cookie);
        } else if snapshot.is_dirty() {
            let cookie = self.storage.commit_session(&snapshot).await;
            response.headers.append("Set-Cookie", &cookie);
        }
        Outcome::Respond(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ServerContext;
    use crate::http_helpers::{Request, Response};
    use crate::middleware::{MiddlewareChain, Params, terminal_fn};
    use serde_json::json;

    #[test]
    fn test_mutations_mark_dirty() {
        let mut session = Session::new("s1");
        assert!(!session.is_dirty());

        session.set("userId", json!("alice"));
        assert!(session.is_dirty());
        assert_eq!(session.get("userId"), Some(json!("alice")));

        let mut session = Session::new("s2");
        session.unset("missing");
        assert!(session.is_dirty());

        let mut session = Session::new("s3");
        session.destroy();
        assert!(session.is_dirty());
        assert!(session.is_destroyed());
    }

    #[test]
    fn test_flash_is_consumed_by_first_read() {
        let mut session = Session::new("s1");
        session.flash("error", json!("nope"));

        assert_eq!(session.get("error"), Some(json!("nope")));
        assert_eq!(session.get("error"), None);
    }

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemorySessionStorage::new("__session");

        let mut session = storage.get_session(None).await;
        session.set("count", json!(1));
        let cookie = storage.commit_session(&session).await;
        assert!(cookie.starts_with("__session="));

        let header = cookie.split(';').next().unwrap().to_string();
        let mut restored = storage.get_session(Some(&header)).await;
        assert_eq!(restored.id(), session.id());
        assert_eq!(restored.get("count"), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_unknown_cookie_yields_fresh_session() {
        let storage = MemorySessionStorage::new("__session");
        let session = storage.get_session(Some("__session=stale")).await;
        assert_ne!(session.id(), "stale");
    }

    async fn run_session_chain(
        terminal: crate::middleware::TerminalHandler,
    ) -> Response {
        let storage = Arc::new(MemorySessionStorage::new("__session"));
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(Arc::new(SessionMiddleware::new(storage)));

        chain
            .execute(
                Arc::new(Request::new("GET", "/")),
                Arc::new(Params::default()),
                Arc::new(ServerContext::new()),
                Arc::new(Vec::new()),
                terminal,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_middleware_commits_mutated_session() {
        let terminal = terminal_fn(|_request, context| async move {
            let session = match context.get(session_token()) {
                Ok(session) => session,
                Err(error) => return Outcome::Failure(error.into()),
            };
            session.lock().unwrap().set("userId", json!("alice"));
            Outcome::Respond(Response::text("ok"))
        });

        let response = run_session_chain(terminal).await;
        let cookie = response.headers.get("Set-Cookie").unwrap();
        assert!(cookie.starts_with("__session="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_middleware_skips_untouched_session() {
        let terminal =
            terminal_fn(|_request, _context| async { Outcome::Respond(Response::text("ok")) });

        let response = run_session_chain(terminal).await;
        assert_eq!(response.headers.get("Set-Cookie"), None);
    }

    #[tokio::test]
    async fn test_middleware_expires_destroyed_session() {
        let terminal = terminal_fn(|_request, context| async move {
            let session = match context.get(session_token()) {
                Ok(session) => session,
                Err(error) => return Outcome::Failure(error.into()),
            };
            session.lock().unwrap().destroy();
            Outcome::Respond(Response::text("bye"))
        });

        let response = run_session_chain(terminal).await;
        let cookie = response.headers.get("Set-Cookie").unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
