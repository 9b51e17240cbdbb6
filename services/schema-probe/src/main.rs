mod config;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drivekit::{metrics, AsyncSession, Session, Statement};

#[derive(Parser, Debug)]
#[command(name = "schema-probe")]
#[command(about = "Runs CQL statements and reports whether the cluster schema is in agreement")]
struct Args {
    #[arg(short, long, default_value = "config/schema-probe.yaml")]
    config: String,

    /// Statement to execute before checking; may be repeated
    #[arg(short, long = "execute")]
    execute: Vec<String>,

    /// Check schema agreement on every statement, not only schema changes
    #[arg(long)]
    always_check: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,
}

#[derive(Serialize)]
struct StatementReport<'a> {
    statement: &'a str,
    rows: usize,
    latency_ms: f64,
    schema_in_agreement: Option<bool>,
    warnings: &'a [String],
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(&args.config)?;

    // Initialize tracing
    let default_filter = format!(
        "schema_probe={level},drivekit={level}",
        level = config.observability.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = config.request.validate()?;
    info!(
        "Connecting to {:?} (schema agreement timeout {:?})",
        config.database.hosts, settings.agreement.timeout
    );

    let session = Session::connect(&config.database, settings).await?;

    for query in &args.execute {
        let mut statement = Statement::new(query.as_str());
        if args.always_check {
            statement = statement.with_schema_agreement();
        }

        let result = session.execute_async(statement)?.await?;
        let info = result.execution_info();
        let report = StatementReport {
            statement: query,
            rows: result.remaining(),
            latency_ms: info.latency.as_secs_f64() * 1000.0,
            schema_in_agreement: info.is_schema_in_agreement(),
            warnings: &info.warnings,
        };
        println!("{}", serde_json::to_string(&report)?);

        if report.schema_in_agreement == Some(false) {
            warn!("Schema not in agreement after: {}", query);
        }
    }

    let agreed = session.check_schema_agreement().await?;
    println!("{}", serde_json::json!({ "check_schema_agreement": agreed }));

    if args.metrics || config.observability.print_metrics {
        print!("{}", metrics::render());
    }

    if !agreed {
        std::process::exit(2);
    }
    Ok(())
}
