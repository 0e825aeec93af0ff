use thiserror::Error;

/// A precondition failed before any work could start (wiki not found, local
/// root missing). Reported like a configuration problem: the CLI maps it to
/// exit status 2, while runtime errors map to 1.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PreconditionError(pub String);

impl PreconditionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
