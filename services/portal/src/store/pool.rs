//! Lazily initialized, shared connection handle.
//!
//! # Purpose
//! The document-store client is created on first use rather than at startup,
//! so the portal can boot (and report a degraded health check) while the
//! database is unreachable.
//!
//! # Concurrency model
//! `get` goes through `tokio::sync::OnceCell::get_or_try_init`: racing callers
//! wait on one initialization and all observe the same value. A failed
//! initialization leaves the cell empty and the next caller retries.
use super::StoreResult;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;

type InitFn<T> = dyn Fn() -> BoxFuture<'static, StoreResult<T>> + Send + Sync;

pub struct LazyPool<T> {
    cell: OnceCell<T>,
    init: Arc<InitFn<T>>,
}

impl<T> LazyPool<T>
where
    T: Send + Sync,
{
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, StoreResult<T>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Arc::new(init),
        }
    }

    pub async fn get(&self) -> StoreResult<&T> {
        self.cell.get_or_try_init(|| (self.init)()).await
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T> std::fmt::Debug for LazyPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyPool")
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}
