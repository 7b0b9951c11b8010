//! The loader contract supplied by the embedding application
//!
//! A loader is an opaque, zero-argument unit of deferred work. Invoking it
//! starts the work and hands back a future that settles with the unit's
//! exported value or a [`LoadFailure`]. Nothing in this crate looks inside
//! the value.

use std::{any::Any, future::Future, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

/// Type-erased value produced by a loader
pub type ModuleValue = Arc<dyn Any + Send + Sync>;

/// Outcome of a single load
pub type LoadResult = std::result::Result<ModuleValue, LoadFailure>;

/// Failure reported by a loader.
///
/// Cloneable so one failure can be handed to every caller waiting on the
/// same in-flight load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LoadFailure {
    pub message: String,
}

impl LoadFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for LoadFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for LoadFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// A deferred unit of work that yields a module value.
///
/// `load` must start the work synchronously and return the pending result.
/// Errors surface through the returned future, never by panicking.
pub trait Loader: Send + Sync {
    fn load(&self) -> BoxFuture<'static, LoadResult>;
}

impl<F, Fut> Loader for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = LoadResult> + Send + 'static,
{
    fn load(&self) -> BoxFuture<'static, LoadResult> {
        (self)().boxed()
    }
}

/// Shared handle to a loader
pub type LoaderRef = Arc<dyn Loader>;

/// Wrap a closure into a shareable loader handle
pub fn loader<F, Fut>(f: F) -> LoaderRef
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult> + Send + 'static,
{
    Arc::new(f)
}

/// Erase a concrete value into a [`ModuleValue`]
pub fn module<T: Any + Send + Sync>(value: T) -> ModuleValue {
    Arc::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_loader_yields_value() {
        let l = loader(|| async { Ok(module(42u32)) });
        let value = l.load().await.unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
    }

    #[tokio::test]
    async fn test_closure_loader_failure() {
        let l = loader(|| async { Err(LoadFailure::new("chunk missing")) });
        let err = l.load().await.unwrap_err();
        assert_eq!(err.to_string(), "chunk missing");
    }
}
