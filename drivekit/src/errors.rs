use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the driver core.
///
/// Schema disagreement is not in here: a check that does not converge is
/// reported as `agreed = false`, never as an error.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("Control channel unavailable: {0}")]
    ControlChannel(String),

    #[error("No live nodes to poll for schema agreement")]
    NoLiveNodes,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DriverError {
    /// True for errors that abort a call because of how the driver was set up.
    pub fn is_config(&self) -> bool {
        matches!(self, DriverError::Config(_))
    }

    /// True for errors raised while talking to the cluster on behalf of a statement.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            DriverError::Request(_) | DriverError::RequestTimeout(_) | DriverError::UnexpectedResponse(_)
        )
    }
}

impl From<scylla::transport::errors::QueryError> for DriverError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        DriverError::Request(err.to_string())
    }
}

impl From<anyhow::Error> for DriverError {
    fn from(err: anyhow::Error) -> Self {
        DriverError::Unknown(err.to_string())
    }
}
