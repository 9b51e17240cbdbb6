use std::sync::Arc;

use chrono::Utc;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::agreement::{AgreementResult, SchemaAgreementChecker};
use crate::config::ExecutionSettings;
use crate::database::{ControlChannel, DatabaseConnection};
use crate::errors::DriverError;
use crate::metrics;
use crate::result::{ExecutedResponse, Execution, ResultShape, ResultShapeRegistry};
use crate::types::{ExecutionMetadata, Statement};

/// Single entry point for statement execution.
///
/// Cloning is cheap; clones share the connection, checker and registry, and
/// every call is independent of the others.
#[derive(Clone)]
pub struct RequestExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    connection: Arc<dyn DatabaseConnection>,
    checker: SchemaAgreementChecker,
    registry: Arc<ResultShapeRegistry>,
    settings: ExecutionSettings,
}

impl RequestExecutor {
    pub fn new(
        connection: Arc<dyn DatabaseConnection>,
        channel: Arc<dyn ControlChannel>,
        registry: Arc<ResultShapeRegistry>,
        settings: ExecutionSettings,
    ) -> Self {
        let checker = SchemaAgreementChecker::from_settings(channel, &settings.agreement);
        Self {
            inner: Arc::new(ExecutorInner {
                connection,
                checker,
                registry,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.inner.settings
    }

    pub fn registry(&self) -> &ResultShapeRegistry {
        &self.inner.registry
    }

    /// Execute `statement` and shape the outcome as `S`.
    ///
    /// An unregistered shape fails here with [`DriverError::Config`], before
    /// anything is sent. Request failures surface through the shaped result.
    pub fn execute<S: ResultShape>(
        &self,
        statement: impl Into<Statement>,
        _shape: &S,
    ) -> Result<S::Output, DriverError> {
        let processor = self.inner.registry.lookup::<S>().ok_or_else(|| {
            error!("No result processor registered for shape `{}`", S::NAME);
            DriverError::Config(format!(
                "no result processor registered for shape `{}`",
                S::NAME
            ))
        })?;

        let statement = statement.into();
        let inner = self.inner.clone();
        let execution = Execution::new(S::NAME, async move { inner.run(statement, S::NAME).await });

        processor.process(execution)
    }

    /// Standalone agreement check against the configured timeout.
    pub async fn check_schema_agreement(&self) -> Result<bool, DriverError> {
        Ok(self.check_schema_agreement_detailed().await?.agreed)
    }

    pub async fn check_schema_agreement_detailed(&self) -> Result<AgreementResult, DriverError> {
        self.inner
            .checker
            .check_agreement(self.inner.settings.agreement.timeout)
            .await
    }
}

impl ExecutorInner {
    async fn run(&self, statement: Statement, shape: &'static str) -> Result<ExecutedResponse, DriverError> {
        let request_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let budget = self.settings.request_timeout;

        debug!("Executing request {} as `{}`: {}", request_id, shape, statement.query);

        let wire = match timeout(budget, self.connection.send(&statement)).await {
            Ok(Ok(wire)) => wire,
            Ok(Err(e)) => {
                warn!("Request {} failed on {}: {}", request_id, self.connection.driver_name(), e);
                metrics::record_request(shape, false, start.elapsed().as_secs_f64());
                return Err(e);
            }
            Err(_) => {
                warn!("Request {} timed out after {:?}", request_id, budget);
                metrics::record_request(shape, false, start.elapsed().as_secs_f64());
                return Err(DriverError::RequestTimeout(budget));
            }
        };

        let schema_in_agreement = if wire.response.is_schema_change() || statement.await_schema_agreement {
            // The check shares the request budget; running out of it reads as "not agreed".
            let remaining = budget.saturating_sub(start.elapsed());
            let agreement_budget = self.settings.agreement.timeout.min(remaining);
            let agreement = self.checker.check_agreement(agreement_budget).await?;
            Some(agreement.agreed)
        } else {
            None
        };

        let latency = start.elapsed();
        metrics::record_request(shape, true, latency.as_secs_f64());

        Ok(ExecutedResponse {
            response: wire.response,
            metadata: ExecutionMetadata {
                request_id,
                coordinator: wire.coordinator,
                started_at,
                latency,
                warnings: wire.warnings,
                tracing_id: wire.tracing_id,
                schema_in_agreement,
            },
        })
    }
}
