use thiserror::Error;

/// Returned by [`crate::Breaker::guard`] when a call could not be attempted
/// or the attempted call failed.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit is open")]
    Open,

    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Open => None,
        }
    }
}
