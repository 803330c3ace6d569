use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arr_engine::ArrBreakdownEngine;
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::handlers::ArrBreakdownResponse;
use crate::period::period_from_params;
use crate::store::read_snapshot_file;

#[derive(Debug, Parser)]
#[command(name = "arr-api", version, about = "ARR breakdown service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API (the default)
    Serve,
    /// Compute a breakdown from a snapshot file and print it as JSON
    Report {
        /// Path to a tenant snapshot (`<tenant>.json`)
        #[arg(long)]
        snapshot: PathBuf,
        /// Period start, RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Period end, RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
    },
}

/// Run one offline report and return it as pretty JSON.
pub async fn run_report(
    engine: &ArrBreakdownEngine,
    snapshot: &Path,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<String> {
    let period = period_from_params(start, end)?;
    let snapshot = read_snapshot_file(snapshot).await?;
    let outcome = engine
        .compute(&snapshot, period, Utc::now())
        .context("Failed to compute ARR breakdown")?;

    for fault in &outcome.faults {
        tracing::warn!(
            kind = fault.kind.as_str(),
            contract_id = %fault.contract_id,
            service_line_item_id = %fault.service_line_item_id,
            "lineage excluded"
        );
    }

    let response = ArrBreakdownResponse::from(outcome);
    Ok(serde_json::to_string_pretty(&response)?)
}
