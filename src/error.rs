use thiserror::Error;

/// Failure of a whole refresh cycle. The previous snapshot stays published.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("TWSE fetch failed: {0:#}")]
    UpdateFailed(anyhow::Error),
}

impl RefreshError {
    /// The scheduler tries again on its next tick.
    pub fn is_retryable(&self) -> bool {
        match self {
            RefreshError::UpdateFailed(_) => true,
        }
    }

    pub fn cause(&self) -> &anyhow::Error {
        match self {
            RefreshError::UpdateFailed(err) => err,
        }
    }
}

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("no instrument codes configured")]
    NoInstruments,

    #[error("environment variable {0} is not set")]
    MissingVariable(&'static str),
}
