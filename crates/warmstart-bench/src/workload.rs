//! Caller-supplied benchmark work

use std::{future::Future, sync::Arc};

use futures::future::{self, BoxFuture, FutureExt};

/// A repeatable unit of async work. Also used for lifecycle hooks.
pub trait Workload: Send + Sync {
    fn call(&self) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> Workload for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn call(&self) -> BoxFuture<'static, anyhow::Result<()>> {
        (self)().boxed()
    }
}

pub type WorkloadRef = Arc<dyn Workload>;

/// Wrap an async closure
pub fn workload<F, Fut>(f: F) -> WorkloadRef
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(f)
}

/// Wrap a synchronous closure; it runs inside the timed call
pub fn from_fn<F>(f: F) -> WorkloadRef
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move || future::ready(f()))
}
