//! Convenience façade over [`RequestExecutor`].
//!
//! Each method is `execute` with a fixed result shape; nothing here adds
//! behavior of its own.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{DatabaseConfig, ExecutionSettings};
use crate::database::ScyllaConnection;
use crate::errors::DriverError;
use crate::executor::RequestExecutor;
use crate::result::{
    AsyncPage, AsyncPrepared, AsyncResultSet, Blocking, BlockingPrepared, PreparedStatement,
    ResultFuture, ResultSet, ResultShapeRegistry, Spawned,
};
use crate::types::Statement;

pub trait CoreSession {
    fn executor(&self) -> &RequestExecutor;
}

pub trait SyncSession: CoreSession {
    /// Execute and wait for the result on the calling thread.
    fn execute(&self, statement: impl Into<Statement>) -> Result<ResultSet, DriverError> {
        self.executor().execute(statement, &Blocking)
    }

    fn prepare(&self, query: impl Into<String>) -> Result<PreparedStatement, DriverError> {
        self.executor().execute(Statement::prepare(query), &BlockingPrepared)
    }
}

pub trait AsyncSession: CoreSession {
    fn execute_async(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<ResultFuture<AsyncResultSet>, DriverError> {
        self.executor().execute(statement, &AsyncPage)
    }

    fn prepare_async(
        &self,
        query: impl Into<String>,
    ) -> Result<ResultFuture<PreparedStatement>, DriverError> {
        self.executor().execute(Statement::prepare(query), &AsyncPrepared)
    }

    /// Start executing right away as a tokio task.
    fn spawn_execute(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<JoinHandle<Result<AsyncResultSet, DriverError>>, DriverError> {
        self.executor().execute(statement, &Spawned)
    }
}

/// Session exposing both the blocking and the async conveniences.
#[derive(Clone)]
pub struct Session {
    executor: RequestExecutor,
}

impl Session {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Connect to a cluster with the built-in result shapes registered.
    pub async fn connect(
        database: &DatabaseConfig,
        settings: ExecutionSettings,
    ) -> Result<Self, DriverError> {
        let connection = ScyllaConnection::new(database).await?;
        let channel = Arc::new(connection.control_channel());
        let registry = Arc::new(ResultShapeRegistry::with_defaults(Handle::current()));

        info!(
            "Session ready (request timeout {:?}, schema agreement timeout {:?})",
            settings.request_timeout, settings.agreement.timeout
        );

        Ok(Self::new(RequestExecutor::new(
            Arc::new(connection),
            channel,
            registry,
            settings,
        )))
    }

    pub async fn check_schema_agreement(&self) -> Result<bool, DriverError> {
        self.executor.check_schema_agreement().await
    }
}

impl CoreSession for Session {
    fn executor(&self) -> &RequestExecutor {
        &self.executor
    }
}

impl CoreSession for RequestExecutor {
    fn executor(&self) -> &RequestExecutor {
        self
    }
}

impl SyncSession for Session {}
impl AsyncSession for Session {}
impl AsyncSession for RequestExecutor {}
