//! Per-request context store keyed by opaque typed tokens.
//!
//! Tokens are identity-keyed: every call to [`Token::new`] mints a fresh id,
//! so two tokens created with the same type parameter never collide. This
//! keeps independently authored middleware from stepping on each other's
//! values. The label is carried for diagnostics only.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::error::ContextError;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(0);

/// A type-safe key into the per-request [`ServerContext`].
pub struct Token<T> {
    id: u64,
    label: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Token<T> {
    /// Mint a new token. Distinct from every other token ever minted.
    pub fn new(label: &'static str) -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            label,
            _marker: PhantomData,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

// PhantomData<fn() -> T> keeps these impls unconditional on T.
impl<T> Clone for Token<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Token<T> {}

impl<T> std::fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl<T> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Token<T> {}

impl<T> std::hash::Hash for Token<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Mutable request-scoped store shared across the middleware chain and the
/// terminal handler.
///
/// Execution is strictly sequential per request, so the inner lock is only
/// ever contended with itself across suspension points; it is never held
/// across an await.
#[derive(Debug, Default)]
pub struct ServerContext {
    values: Mutex<FxHashMap<u64, Box<dyn Any + Send + Sync>>>,
}

impl ServerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `token`, replacing any previous value.
    pub fn set<T: Send + Sync + 'static>(&self, token: Token<T>, value: T) {
        self.lock().insert(token.id, Box::new(value));
    }

    /// Clone the value stored under `token` out of the context.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, token: Token<T>) -> Result<T, ContextError> {
        self.lock()
            .get(&token.id)
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
            .ok_or(ContextError::NotFound(token.label))
    }

    pub fn contains<T>(&self, token: Token<T>) -> bool {
        self.lock().contains_key(&token.id)
    }

    pub fn remove<T: Send + Sync + 'static>(&self, token: Token<T>) -> Option<T> {
        self.lock()
            .remove(&token.id)
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<u64, Box<dyn Any + Send + Sync>>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let context = ServerContext::new();
        let user: Token<String> = Token::new("user");

        context.set(user, "alice".to_string());
        assert_eq!(context.get(user).unwrap(), "alice");
    }

    #[test]
    fn test_get_missing_fails() {
        let context = ServerContext::new();
        let user: Token<String> = Token::new("user");

        let error = context.get(user).unwrap_err();
        assert_eq!(error.to_string(), "context value not found for `user`");
    }

    #[test]
    fn test_tokens_with_same_type_do_not_collide() {
        let context = ServerContext::new();
        let first: Token<u32> = Token::new("counter");
        let second: Token<u32> = Token::new("counter");

        context.set(first, 1);
        assert_eq!(context.get(first).unwrap(), 1);
        assert!(context.get(second).is_err());
        assert_ne!(first, second);
    }

    #[test]
    fn test_set_overwrites() {
        let context = ServerContext::new();
        let count: Token<u32> = Token::new("count");

        context.set(count, 1);
        context.set(count, 2);
        assert_eq!(context.get(count).unwrap(), 2);
    }

    #[test]
    fn test_remove() {
        let context = ServerContext::new();
        let flag: Token<bool> = Token::new("flag");

        context.set(flag, true);
        assert_eq!(context.remove(flag), Some(true));
        assert!(!context.contains(flag));
    }
}
