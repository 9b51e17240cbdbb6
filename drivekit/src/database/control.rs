use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::DriverError;
use crate::types::NodeView;

/// Topology and metadata path used by the schema agreement checker.
///
/// `list_nodes` must return an owned snapshot; later topology events must not
/// show through it. Failing to produce a roster is reported as
/// [`DriverError::ControlChannel`].
#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeView>, DriverError>;

    async fn list_up_nodes(&self) -> Result<Vec<NodeView>, DriverError> {
        Ok(self
            .list_nodes()
            .await?
            .into_iter()
            .filter(|node| node.is_up())
            .collect())
    }

    /// One round trip asking `node` for its current schema version.
    ///
    /// Any error other than [`DriverError::ControlChannel`] only marks this
    /// node as non-responding for the current round.
    async fn query_schema_version(&self, node: &NodeView) -> Result<Uuid, DriverError>;
}
