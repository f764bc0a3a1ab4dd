//! Unwrapping a future whose value is another future.
//!
//! A body that itself submits work and returns the resulting handle produces
//! a `WorkFuture<WorkFuture<T>>`. Continuing on it hands the inner *handle*
//! to the continuation, not the value. [`flatten`](WorkFuture::flatten)
//! composes the two levels into a single `WorkFuture<T>` without blocking
//! and without a scheduler hop: both registrations complete the proxy inline
//! on whichever thread settles the corresponding future.

use crate::error::{SchedulingError, WorkError};
use crate::future::WorkFuture;
use crate::work::{Outcome, WorkItem};
use std::sync::Arc;
use tracing::debug;

impl<T: Clone + Send + 'static> WorkFuture<WorkFuture<T>> {
    /// Returns a future that settles with the inner future's outcome.
    ///
    /// If the outer future fails, the proxy fails with the same error and no
    /// inner future is ever registered against.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::InvalidState`] if the outer future was consumed.
    /// An inner future that was already consumed fails the proxy with
    /// [`WorkError::InvalidState`].
    pub fn flatten(&self) -> Result<WorkFuture<T>, SchedulingError> {
        let proxy = WorkItem::<T>::new(self.item.scenario(), self.item.diagnostics(), None);
        debug!(outer = %self.id(), work_id = %proxy.id(), "Flattening nested future");

        let outer_proxy = Arc::clone(&proxy);
        self.item
            .register(Box::new(move |outcome: Outcome<WorkFuture<T>>| match outcome {
                Err(error) => outer_proxy.complete(Err(error)),
                Ok(inner) => {
                    let inner_proxy = Arc::clone(&outer_proxy);
                    let registered = inner
                        .item
                        .register(Box::new(move |outcome: Outcome<T>| inner_proxy.complete(outcome)));
                    if let Err(error) = registered {
                        outer_proxy.complete(Err(WorkError::from(error)));
                    }
                }
            }))?;

        Ok(WorkFuture::from_item(proxy))
    }
}
