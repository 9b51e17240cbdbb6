//! Built-in result shapes and their processors.

use std::future::IntoFuture;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::DriverError;
use crate::result::{
    AsyncResultSet, ExecutedResponse, Execution, PreparedStatement, ResultFuture, ResultProcessor, ResultSet,
    ResultShape,
};

/// Synchronous result: the calling thread waits for the whole execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking;

impl ResultShape for Blocking {
    type Output = ResultSet;
    const NAME: &'static str = "blocking";
}

/// Synchronous prepared statement handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingPrepared;

impl ResultShape for BlockingPrepared {
    type Output = PreparedStatement;
    const NAME: &'static str = "blocking_prepared";
}

/// First page, as a future the caller awaits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncPage;

impl ResultShape for AsyncPage {
    type Output = ResultFuture<AsyncResultSet>;
    const NAME: &'static str = "async";
}

/// Prepared statement handle, as a future the caller awaits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncPrepared;

impl ResultShape for AsyncPrepared {
    type Output = ResultFuture<PreparedStatement>;
    const NAME: &'static str = "async_prepared";
}

/// First page, already running as a tokio task.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spawned;

impl ResultShape for Spawned {
    type Output = JoinHandle<Result<AsyncResultSet, DriverError>>;
    const NAME: &'static str = "spawned";
}

/// Drives executions to completion on a captured runtime.
pub struct BlockingProcessor {
    runtime: Handle,
}

impl BlockingProcessor {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl BlockingProcessor {
    fn drive(&self, execution: Execution) -> Result<ExecutedResponse, DriverError> {
        match Handle::try_current() {
            Ok(current) => {
                // Called from inside a runtime: only a multi-thread worker may block.
                if current.runtime_flavor() != RuntimeFlavor::MultiThread {
                    return Err(DriverError::Config(
                        "blocking results cannot be used from a current-thread runtime".to_string(),
                    ));
                }
                debug!("Blocking in place on a runtime worker");
                tokio::task::block_in_place(|| self.runtime.block_on(execution.into_future()))
            }
            Err(_) => self.runtime.block_on(execution.into_future()),
        }
    }
}

impl ResultProcessor<Blocking> for BlockingProcessor {
    fn process(&self, execution: Execution) -> Result<ResultSet, DriverError> {
        ResultSet::try_from(self.drive(execution)?)
    }
}

impl ResultProcessor<BlockingPrepared> for BlockingProcessor {
    fn process(&self, execution: Execution) -> Result<PreparedStatement, DriverError> {
        PreparedStatement::try_from(self.drive(execution)?)
    }
}

pub struct AsyncPageProcessor;

impl ResultProcessor<AsyncPage> for AsyncPageProcessor {
    fn process(&self, execution: Execution) -> Result<ResultFuture<AsyncResultSet>, DriverError> {
        Ok(Box::pin(async move { AsyncResultSet::try_from(execution.await?) }))
    }
}

pub struct AsyncPreparedProcessor;

impl ResultProcessor<AsyncPrepared> for AsyncPreparedProcessor {
    fn process(&self, execution: Execution) -> Result<ResultFuture<PreparedStatement>, DriverError> {
        Ok(Box::pin(async move { PreparedStatement::try_from(execution.await?) }))
    }
}

/// Starts the execution immediately on `runtime` and hands back the task handle.
pub struct SpawnedProcessor {
    runtime: Handle,
}

impl SpawnedProcessor {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl ResultProcessor<Spawned> for SpawnedProcessor {
    fn process(
        &self,
        execution: Execution,
    ) -> Result<JoinHandle<Result<AsyncResultSet, DriverError>>, DriverError> {
        Ok(self
            .runtime
            .spawn(async move { AsyncResultSet::try_from(execution.await?) }))
    }
}
