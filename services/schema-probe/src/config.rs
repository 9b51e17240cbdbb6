use anyhow::Result;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use drivekit::config::{DatabaseConfig, ObservabilityConfig, RequestConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub database: DatabaseConfig,
    pub request: RequestConfig,
    pub observability: ObservabilityConfig,
}

pub fn load_config(path: &str) -> Result<ProbeConfig> {
    let config = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("SCHEMA_PROBE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
