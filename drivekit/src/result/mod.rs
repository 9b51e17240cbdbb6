//! Result shapes: caller-chosen representations of an executed statement.
//!
//! A shape is a zero-sized marker type implementing [`ResultShape`]. The
//! executor looks up the [`ResultProcessor`] registered for the marker and
//! hands it the in-flight [`Execution`]; the processor decides whether to
//! block on it, wrap it in a future, spawn it, and so on.

pub mod processors;
pub mod registry;

use std::future::{Future, IntoFuture};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::errors::DriverError;
use crate::types::{ExecutionMetadata, RawResponse, Row};

pub use processors::{
    AsyncPage, AsyncPageProcessor, AsyncPrepared, AsyncPreparedProcessor, Blocking,
    BlockingPrepared, BlockingProcessor, Spawned, SpawnedProcessor,
};
pub use registry::ResultShapeRegistry;

pub type ResultFuture<T> = BoxFuture<'static, Result<T, DriverError>>;

/// Descriptor of one result representation.
///
/// Identity is the implementing type; two shapes never compare equal by content.
pub trait ResultShape: Send + Sync + 'static {
    type Output: Send + 'static;

    const NAME: &'static str;
}

/// Turns an in-flight execution into the representation of shape `S`.
pub trait ResultProcessor<S: ResultShape>: Send + Sync {
    fn process(&self, execution: Execution) -> Result<S::Output, DriverError>;
}

/// Raw response and metadata of a completed statement.
#[derive(Debug, Clone)]
pub struct ExecutedResponse {
    pub response: RawResponse,
    pub metadata: ExecutionMetadata,
}

/// The request pipeline for one statement, not yet driven.
///
/// Nothing goes over the wire until the execution is awaited.
pub struct Execution {
    shape: &'static str,
    future: ResultFuture<ExecutedResponse>,
}

impl Execution {
    pub fn new<F>(shape: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<ExecutedResponse, DriverError>> + Send + 'static,
    {
        Self {
            shape,
            future: Box::pin(future),
        }
    }

    pub fn shape(&self) -> &'static str {
        self.shape
    }
}

impl IntoFuture for Execution {
    type Output = Result<ExecutedResponse, DriverError>;
    type IntoFuture = ResultFuture<ExecutedResponse>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution").field("shape", &self.shape).finish()
    }
}

/// Fully materialized result of a synchronous execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub metadata: ExecutionMetadata,
}

impl ResultSet {
    pub fn execution_info(&self) -> &ExecutionMetadata {
        &self.metadata
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn one(&self) -> Option<&Row> {
        self.rows.first()
    }
}

impl TryFrom<ExecutedResponse> for ResultSet {
    type Error = DriverError;

    fn try_from(executed: ExecutedResponse) -> Result<Self, Self::Error> {
        let (columns, rows) = rows_of(executed.response)?;
        Ok(Self {
            columns,
            rows,
            metadata: executed.metadata,
        })
    }
}

/// First page of a result, delivered asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncResultSet {
    pub columns: Vec<String>,
    current_page: Vec<Row>,
    paging_state: Option<Vec<u8>>,
    pub metadata: ExecutionMetadata,
}

impl AsyncResultSet {
    pub fn current_page(&self) -> &[Row] {
        &self.current_page
    }

    pub fn remaining(&self) -> usize {
        self.current_page.len()
    }

    pub fn has_more_pages(&self) -> bool {
        self.paging_state.is_some()
    }

    pub fn paging_state(&self) -> Option<&[u8]> {
        self.paging_state.as_deref()
    }

    pub fn execution_info(&self) -> &ExecutionMetadata {
        &self.metadata
    }
}

impl TryFrom<ExecutedResponse> for AsyncResultSet {
    type Error = DriverError;

    fn try_from(executed: ExecutedResponse) -> Result<Self, Self::Error> {
        let paging_state = match &executed.response {
            RawResponse::Rows(page) => page.paging_state.clone(),
            _ => None,
        };
        let (columns, rows) = rows_of(executed.response)?;
        Ok(Self {
            columns,
            current_page: rows,
            paging_state,
            metadata: executed.metadata,
        })
    }
}

/// Handle to a statement prepared on the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedStatement {
    pub id: Vec<u8>,
    pub query: String,
    pub bind_markers: usize,
    pub metadata: ExecutionMetadata,
}

impl TryFrom<ExecutedResponse> for PreparedStatement {
    type Error = DriverError;

    fn try_from(executed: ExecutedResponse) -> Result<Self, Self::Error> {
        match executed.response {
            RawResponse::Prepared(prepared) => Ok(Self {
                id: prepared.id,
                query: prepared.query,
                bind_markers: prepared.bind_markers,
                metadata: executed.metadata,
            }),
            other => Err(DriverError::UnexpectedResponse(format!(
                "expected a prepared response, got {}",
                other.kind()
            ))),
        }
    }
}

fn rows_of(response: RawResponse) -> Result<(Vec<String>, Vec<Row>), DriverError> {
    match response {
        RawResponse::Rows(page) => Ok((page.columns, page.rows)),
        RawResponse::Void | RawResponse::SetKeyspace(_) | RawResponse::SchemaChange(_) => {
            Ok((Vec::new(), Vec::new()))
        }
        RawResponse::Prepared(_) => Err(DriverError::UnexpectedResponse(
            "expected a result set, got prepared".to_string(),
        )),
    }
}
