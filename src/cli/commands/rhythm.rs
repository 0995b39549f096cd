//! `vessel rhythm` - archived session signatures.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, RhythmIndexEntry};
use crate::domain::ports::ArchiveStore;
use crate::infrastructure::persistence::SessionArchive;

#[derive(Args, Debug)]
pub struct RhythmArgs {
    /// Maximum number of sessions to display, most recent first
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Only sessions filed under this model label
    #[arg(short, long)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RhythmOutput {
    pub sessions: Vec<RhythmIndexEntry>,
}

impl CommandOutput for RhythmOutput {
    fn to_human(&self) -> String {
        if self.sessions.is_empty() {
            return "No archived sessions.".to_string();
        }
        let refs: Vec<&RhythmIndexEntry> = self.sessions.iter().collect();
        format!(
            "{}\nShowing {} session(s)",
            TableFormatter::new().format_rhythm(&refs),
            refs.len()
        )
    }
}

pub fn execute(args: RhythmArgs, config: &Config, json_mode: bool) -> Result<()> {
    let archive = SessionArchive::new(&config.persistence.data_dir);
    let index = archive
        .load_rhythm_index()
        .context("Failed to read rhythm index")?;

    let sessions = index
        .sessions
        .into_iter()
        .rev()
        .filter(|e| args.model.as_deref().is_none_or(|m| e.model == m))
        .take(args.limit)
        .collect();

    output(&RhythmOutput { sessions }, json_mode);
    Ok(())
}
