//! Command-line arguments and `.env` file loading.

use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Step {
    Ingest,
    Parse,
    Enrich,
    Load,
    Publish,
}

impl Step {
    pub const ALL: [Step; 5] = [Step::Ingest, Step::Parse, Step::Enrich, Step::Load, Step::Publish];
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Ingest => "ingest",
            Step::Parse => "parse",
            Step::Enrich => "enrich",
            Step::Load => "load",
            Step::Publish => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "heatmeter-etl", version, about = "Loads heat-meter exports into the reporting warehouse")]
pub struct Args {
    /// Read settings from this file instead of `./.env`
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Steps to run, comma separated
    #[arg(long, value_enum, value_delimiter = ',', ignore_case = true, default_values_t = Step::ALL)]
    pub steps: Vec<Step>,

    /// Process only these batches (repeatable); ingest still registers new files
    #[arg(long = "load-id", value_name = "UUID")]
    pub load_ids: Vec<Uuid>,

    /// Run everything except the load step
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    pub fn runs(&self, step: Step) -> bool {
        self.steps.contains(&step) && !(self.dry_run && step == Step::Load)
    }

    /// Batches to process: the `--load-id` values when given, otherwise what ingest
    /// returned. Duplicates are dropped, first occurrence wins.
    pub fn batches(&self, ingested: Vec<Uuid>) -> Vec<Uuid> {
        let candidates = if self.load_ids.is_empty() { ingested } else { self.load_ids.clone() };
        let mut batches = Vec::with_capacity(candidates.len());
        for load_id in candidates {
            if !batches.contains(&load_id) {
                batches.push(load_id);
            }
        }
        batches
    }
}

/// Where `.env` settings were read from.
#[derive(Debug)]
pub struct LoadedEnvFile {
    pub path: PathBuf,
    pub explicit: bool,
}

/// Load the explicit env file, or `./.env` when present. Variables already set in the
/// process environment win over the file.
pub fn load_env(explicit: Option<&Path>) -> Result<Option<LoadedEnvFile>, String> {
    let (path, explicit) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let path = cwd.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            (path, false)
        }
    };

    dotenvy::from_path(&path).map_err(|e| format!("failed to load env file {}: {}", path.display(), e))?;
    Ok(Some(LoadedEnvFile { path, explicit }))
}
