//! Relay error types.

use std::fmt;

use thiserror::Error;

/// Returned by [`RelaySender::submit`](crate::RelaySender::submit) once the
/// relay has been closed. Carries the rejected value back to the caller.
#[derive(Error)]
#[error("priority relay is closed")]
pub struct RelayClosed<T>(pub T);

impl<T> RelayClosed<T> {
    /// Recover the value that could not be submitted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for RelayClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClosed").finish_non_exhaustive()
    }
}
