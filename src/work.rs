//! The unit of work.
//!
//! Work is a single capability: given an item index, do something and
//! report success or failure. Plain closures implement both traits through
//! blanket impls, so callers rarely implement them by hand.

use std::future::Future;

use async_trait::async_trait;

use crate::error::ItemError;

/// Asynchronous work run by [`BoundedRunner`](crate::BoundedRunner).
///
/// # Example
///
/// ```
/// use bounded_runner::{ItemError, Work};
///
/// struct Fetch {
///     base_url: String,
/// }
///
/// #[async_trait::async_trait]
/// impl Work for Fetch {
///     async fn run(&self, index: usize) -> Result<(), ItemError> {
///         let _url = format!("{}/page/{}", self.base_url, index);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Work: Send + Sync + 'static {
    /// Runs the item at `index`.
    async fn run(&self, index: usize) -> Result<(), ItemError>;
}

#[async_trait]
impl<F, Fut> Work for F
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ItemError>> + Send + 'static,
{
    async fn run(&self, index: usize) -> Result<(), ItemError> {
        (self)(index).await
    }
}

/// Synchronous work run on the threads of a [`WorkerPool`](crate::WorkerPool).
pub trait BlockingWork: Sync {
    /// Runs the item at `index` on the calling worker thread.
    fn run(&self, index: usize) -> Result<(), ItemError>;
}

impl<F> BlockingWork for F
where
    F: Fn(usize) -> Result<(), ItemError> + Sync,
{
    fn run(&self, index: usize) -> Result<(), ItemError> {
        (self)(index)
    }
}
