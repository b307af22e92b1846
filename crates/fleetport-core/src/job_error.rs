//! Job execution error types
//!
//! Lets a job handler say whether a failure is worth redelivering
//! (recoverable) or should fail the job immediately (unrecoverable).

use std::fmt;

#[derive(Debug)]
pub struct JobError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl JobError {
    /// The job fails without redelivery. Use for input that will not change
    /// on retry: unsupported file formats, missing configuration.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// The transport may redeliver the job according to its retry policy.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for JobError {
    /// Plain errors are treated as recoverable.
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

/// True when `err` carries a [`JobError`] marked unrecoverable.
/// Anything else is retried.
pub fn is_unrecoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<JobError>()
        .map(|je| !je.is_recoverable())
        .unwrap_or(false)
}
