//! Example: Run a catalog query and print the first rows
//!
//! Logs in with credentials from the environment, runs a small public
//! query, and prints the resulting table.
//!
//! # Usage
//!
//! ```bash
//! SPLUS_USER=you SPLUS_PASS=secret cargo run --example query_catalog
//! ```

use std::env;

use caelum::{Connection, Value};
use tracing_subscriber::EnvFilter;

/// Rows to print from the result.
const MAX_ROWS_TO_PRINT: usize = 10;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let username = env::var("SPLUS_USER").expect("SPLUS_USER environment variable must be set");
    let password = env::var("SPLUS_PASS").expect("SPLUS_PASS environment variable must be set");

    let mut conn = Connection::login(&username, &password)?;
    tracing::info!(collaborator = conn.is_collaborator(), "logged in");

    let query = "SELECT TOP 10 id, ra, dec, r_auto \
                 FROM idr4_dual.idr4_detection_image \
                 WHERE r_auto < 14";
    tracing::info!(%query, "submitting query");

    let table = conn.query_public(query)?;
    tracing::info!(
        rows = table.n_rows(),
        columns = table.n_columns(),
        "query complete"
    );

    let header: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    println!("\n{}", header.join("  "));
    for row in 0..table.n_rows().min(MAX_ROWS_TO_PRINT) {
        let cells: Vec<String> = table
            .columns()
            .iter()
            .map(|c| match &c.values[row] {
                Value::Int(v) => v.to_string(),
                Value::Float(v) => format!("{:.4}", v),
                Value::Text(v) => v.clone(),
                Value::Null => String::new(),
            })
            .collect();
        println!("{}", cells.join("  "));
    }

    Ok(())
}

/// Initialize tracing subscriber with console output.
fn init_tracing() {
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
