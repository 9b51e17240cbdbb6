use async_trait::async_trait;

use crate::errors::DriverError;
use crate::types::{Statement, WireResponse};

/// The wire side of statement execution.
///
/// Implementations own framing, routing and connection pooling. A failure
/// here is a request error and never says anything about schema agreement.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    async fn send(&self, statement: &Statement) -> Result<WireResponse, DriverError>;

    fn driver_name(&self) -> &str;
}
