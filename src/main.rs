pub mod cli;
pub mod config;
pub mod db {
    pub mod models;
    pub mod pg;
}
pub mod models {
    pub mod dimension;
}
pub mod normalize {
    pub mod codes;
    pub mod units;
}
pub mod rows;
pub mod schema;
pub mod services {
    pub mod enrich;
    pub mod ingest;
    pub mod load;
    pub mod parse;
    pub mod publish;
    pub mod resolve;
}
pub mod source;
pub mod step;
pub mod store;
pub mod utils;

use crate::cli::{Args, Step};
use crate::config::Config;
use crate::services::{enrich, ingest, load, parse, publish};
use crate::step::{StepError, StepReport};
use clap::Parser;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{debug, error, info, warn};
use uuid::Uuid;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) if applied.is_empty() => {
            info!("Database schema is up to date; no migrations were applied");
            Ok(())
        }
        Ok(applied) => {
            let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
            info!("Applied {} database migration(s): {}", applied.len(), names);
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

fn log_report(step: Step, report: &StepReport) {
    match serde_json::to_string(report) {
        Ok(json) => debug!("{} report: {}", step, json),
        Err(e) => warn!("{} report for load {} could not be serialized: {}", step, report.load_id, e),
    }
}

/// Parse, enrich and load one batch. The first failing step ends the batch.
fn run_batch(conn: &mut PgConnection, cfg: &Config, args: &Args, load_id: Uuid) -> Result<(), StepError> {
    if args.runs(Step::Parse) {
        log_report(Step::Parse, &parse::parse(conn, load_id, cfg.default_tz)?);
    }
    if args.runs(Step::Enrich) {
        log_report(Step::Enrich, &enrich::enrich(conn, load_id, cfg.default_tz)?);
    }
    if args.runs(Step::Load) {
        log_report(Step::Load, &load::load(conn, load_id)?);
    }
    Ok(())
}

pub fn run(args: &Args) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (raw_dir={}, file_patterns={}, default_tz={}, steps={}, dry_run={})",
        cfg.raw_dir.display(),
        cfg.file_patterns.join(","),
        cfg.default_tz,
        args.steps.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(","),
        args.dry_run
    );

    // 2) Connect DB
    let mut conn = PgConnection::establish(&cfg.database_url).map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");

    // 3) Apply pending database migrations
    apply_database_migrations(&mut conn)?;

    // 4) Register source files
    let mut ingested = Vec::new();
    if args.runs(Step::Ingest) {
        ingested = ingest::ingest(&mut conn, &cfg.raw_dir, &cfg.file_patterns, cfg.default_tz)
            .map_err(|e| format!("ingest failed: {}", e))?;
    }
    if !args.load_ids.is_empty() && !ingested.is_empty() {
        info!(
            "Restricted to {} --load-id batch(es); {} ingested batch(es) are not processed in this run",
            args.load_ids.len(),
            ingested.len()
        );
    }
    let load_ids = args.batches(ingested);
    if args.dry_run {
        info!("Dry run: the load step is skipped, no facts will be written");
    }

    // 5) Per-batch steps; a failing batch does not stop the others
    let mut failed = 0usize;
    for load_id in &load_ids {
        if let Err(e) = run_batch(&mut conn, &cfg, args, *load_id) {
            error!("Batch {} failed and was rolled back: {}", load_id, e);
            failed += 1;
        }
    }
    info!("Processed {} batch(es), {} failed", load_ids.len(), failed);

    // 6) Reporting views
    if args.runs(Step::Publish) {
        publish::publish(&mut conn).map_err(|e| format!("publish failed: {}", e))?;
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    let loaded_env = match cli::load_env(args.env_file.as_deref()) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "heatmeter-etl {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(&args) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
