//! Command-line entry point: prints the reconciled views of one period.
//!
//! Usage: `cashflow-buddy [YYYY-MM] [UNIT]`

use cashflow_buddy::{
    cache::TtlCache,
    config::{database, settings},
    core::{aggregate::Aggregator, context::EngineContext, period::Period, report},
    errors::{Error, Result},
    sources::{Sources, database::SettingsStore},
};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Prints the reconciled cash-flow views of one period.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Period to report, as YYYY-MM. Defaults to the current month.
    #[arg(value_parser = parse_period)]
    period: Option<Period>,

    /// Restrict the report to one business unit.
    unit: Option<String>,
}

fn parse_period(value: &str) -> std::result::Result<Period, String> {
    value.parse::<Period>().map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();
    let period = cli.period.unwrap_or_else(Period::current);
    let unit_filter = cli.unit;

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    if let Some(unit) = unit_filter.as_deref() {
        if !app_config.units.iter().any(|u| u == unit) {
            return Err(Error::UnknownUnit {
                unit: unit.to_string(),
            });
        }
    }

    // 4. Connect to the record store
    let database_url = database::resolve_database_url(app_config.database_url.as_deref());
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Wire the sources and the engine
    let settings_store = SettingsStore::new(db.clone(), app_config.working_capital);
    let sources = Sources::from_database(&db, settings_store.clone(), app_config.retry);
    let context = EngineContext::new(TtlCache::new(app_config.cache_ttl), period);
    let aggregator = Aggregator::new(sources, context, app_config.units, app_config.allowance)
        .with_settings(settings_store);

    // 6. Aggregate and print
    match aggregator.refresh(unit_filter.as_deref()).await {
        Some(report) => {
            if report.is_degraded() {
                warn!(
                    degraded = report.degraded.len(),
                    "some sources were unavailable"
                );
            }
            println!("{}", report::format_report(&report));
        }
        None => warn!("Period changed during aggregation, nothing to show"),
    }
    Ok(())
}
