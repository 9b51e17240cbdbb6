//! Driver core for CQL clusters: schema agreement detection and result-shape
//! dispatch behind a single request executor.

pub mod agreement;
pub mod config;
pub mod database;
pub mod errors;
pub mod executor;
pub mod metrics;
pub mod result;
pub mod session;
pub mod types;

pub use agreement::{AgreementResult, PollOutcome, SchemaAgreementChecker};
pub use config::{AgreementSettings, DatabaseConfig, ExecutionSettings, RequestConfig};
pub use database::{ControlChannel, DatabaseConnection};
pub use errors::DriverError;
pub use executor::RequestExecutor;
pub use result::{
    AsyncResultSet, Execution, PreparedStatement, ResultProcessor, ResultSet, ResultShape,
    ResultShapeRegistry,
};
pub use session::{AsyncSession, CoreSession, Session, SyncSession};
pub use types::{ExecutionMetadata, NodeState, NodeView, Statement};
