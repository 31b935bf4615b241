//! The job handler contract.
//!
//! A handler receives an [`ExecutionContext`] and either returns an
//! [`ExecutionOutcome`] or fails. The engine only ever talks to handlers
//! through this trait.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{ExecutionContext, ExecutionOutcome};

/// Work performed by a job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run one execution.
    ///
    /// Returning `Err` is treated the same as an outcome with `success == false`.
    async fn run(&self, context: ExecutionContext) -> anyhow::Result<ExecutionOutcome>;
}

/// Shared, type-erased handler as stored in the registry.
pub type SharedHandler = Arc<dyn JobHandler>;

/// Adapter turning an async closure into a [`JobHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ExecutionOutcome>> + Send,
{
    async fn run(&self, context: ExecutionContext) -> anyhow::Result<ExecutionOutcome> {
        (self.0)(context).await
    }
}

/// Build a handler from an async closure.
///
/// ```
/// use tourney_scheduler::{handler_fn, ExecutionOutcome};
///
/// let handler = handler_fn(|ctx| async move {
///     Ok(ExecutionOutcome::success(Some(serde_json::json!({ "job": ctx.job_id }))))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ExecutionOutcome>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
