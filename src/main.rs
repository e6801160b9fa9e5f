//! sqldb - Main entry point.
//!
//! Runs one parameterized statement against the configured database and
//! prints the rows as JSON.

use clap::Parser;
use sqldb::{Client, Config};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only the JSON result
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let connection = config.connection_config()?;
    info!(
        url = %connection.masked_url(),
        "Starting sqldb v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut client = Client::new(connection)?;
    let options = config.execute_options();
    let result = client
        .execute(&config.query, &config.bind_params(), options)
        .await
        .map(|_| ());

    let output = match result {
        Ok(()) if options.get_results => serde_json::to_string_pretty(client.results())?,
        Ok(()) => serde_json::to_string_pretty(&serde_json::json!({
            "rows_affected": client.rows_affected().unwrap_or_default()
        }))?,
        Err(e) => {
            client.close().await;
            return Err(e.into());
        }
    };
    println!("{}", output);

    client.close().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    if let Err(e) = run(&config).await {
        error!(error = %e, "sqldb failed");
        eprintln!("Error: {}", e);
        if let Some(suggestion) = e
            .downcast_ref::<sqldb::DbError>()
            .and_then(sqldb::DbError::suggestion)
        {
            eprintln!("Hint: {}", suggestion);
        }
        std::process::exit(1);
    }
}
