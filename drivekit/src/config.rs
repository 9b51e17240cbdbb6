use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::DriverError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub hosts: Vec<String>,
    pub port: u16,
    pub keyspace: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connection_timeout_ms: u64,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            port: 9042,
            keyspace: None,
            username: None,
            password: None,
            connection_timeout_ms: 5_000,
            pool_size: 4,
        }
    }
}

impl DatabaseConfig {
    pub fn contact_points(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|host| format!("{}:{}", host, self.port))
            .collect()
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

/// Raw request timing options as they appear in a config file.
///
/// Values are signed so that a negative entry can be rejected instead of
/// silently wrapping. Use [`RequestConfig::validate`] to obtain durations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub request_timeout_ms: i64,
    /// Zero disables schema agreement checks.
    pub schema_agreement_timeout_ms: i64,
    pub schema_agreement_interval_ms: i64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 2_000,
            schema_agreement_timeout_ms: 10_000,
            schema_agreement_interval_ms: 200,
        }
    }
}

impl RequestConfig {
    pub fn validate(&self) -> Result<ExecutionSettings, DriverError> {
        let request_timeout = non_negative("request_timeout_ms", self.request_timeout_ms)?;
        if request_timeout.is_zero() {
            return Err(DriverError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let interval = non_negative(
            "schema_agreement_interval_ms",
            self.schema_agreement_interval_ms,
        )?;
        if interval.is_zero() {
            return Err(DriverError::Config(
                "schema_agreement_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(ExecutionSettings {
            request_timeout,
            agreement: AgreementSettings {
                timeout: non_negative(
                    "schema_agreement_timeout_ms",
                    self.schema_agreement_timeout_ms,
                )?,
                interval,
            },
        })
    }
}

fn non_negative(name: &str, value_ms: i64) -> Result<Duration, DriverError> {
    u64::try_from(value_ms)
        .map(Duration::from_millis)
        .map_err(|_| DriverError::Config(format!("{} must not be negative (got {})", name, value_ms)))
}

/// Validated timing used by the executor and the agreement checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    pub request_timeout: Duration,
    pub agreement: AgreementSettings,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
            agreement: AgreementSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgreementSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for AgreementSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            interval: Duration::from_millis(200),
        }
    }
}

impl AgreementSettings {
    pub fn is_disabled(&self) -> bool {
        self.timeout.is_zero()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub print_metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            print_metrics: false,
        }
    }
}
