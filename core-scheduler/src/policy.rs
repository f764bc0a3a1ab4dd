//! Submission options.

use core_async::CancellationToken;

/// Options applied when a work item is submitted.
///
/// By default, work submitted from inside a running body attaches to it as a
/// child: the parent stays running until every attached child has finished,
/// and a failed child fails the parent.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Submit as an independent root instead of a child of the running body.
    pub deny_child_attach: bool,

    /// Token handed to the body through
    /// [`ExecutionContext::cancellation`](crate::ExecutionContext::cancellation).
    /// Schedulers never cancel on their own.
    pub cancellation: CancellationToken,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with `deny_child_attach` set.
    pub fn deny_child_attach() -> Self {
        Self {
            deny_child_attach: true,
            ..Self::default()
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}
