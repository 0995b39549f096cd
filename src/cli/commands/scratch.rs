//! `vessel scratch` - the user's scratchpad of saved snippets.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{output, truncate, CommandOutput, TableFormatter};
use crate::domain::models::{Config, ScratchItem};
use crate::domain::ports::ArchiveStore;
use crate::infrastructure::persistence::SessionArchive;
use crate::services::Scratchpad;

#[derive(Subcommand, Debug)]
pub enum ScratchCommands {
    /// List saved snippets
    List,

    /// Save a snippet
    Add {
        /// Snippet text
        text: String,

        /// Where the snippet came from (usually a model name)
        #[arg(short, long, default_value = "")]
        source: String,

        /// Free-form note
        #[arg(short, long, default_value = "")]
        note: String,
    },

    /// Remove a snippet by id
    Remove {
        /// Snippet id as shown by `scratch list`
        id: String,
    },

    /// Export every snippet as plain text
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
pub struct ScratchListOutput {
    pub items: Vec<ScratchItem>,
}

impl CommandOutput for ScratchListOutput {
    fn to_human(&self) -> String {
        if self.items.is_empty() {
            return "Scratchpad is empty.".to_string();
        }
        format!(
            "{}\n{} item(s)",
            TableFormatter::new().format_scratch(&self.items),
            self.items.len()
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ScratchChangeOutput {
    pub action: &'static str,
    pub id: String,
    pub content: String,
}

impl CommandOutput for ScratchChangeOutput {
    fn to_human(&self) -> String {
        format!("{} {}: {}", self.action, self.id, truncate(&self.content, 60))
    }
}

#[derive(Debug, Serialize)]
pub struct ScratchExportOutput {
    pub items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CommandOutput for ScratchExportOutput {
    fn to_human(&self) -> String {
        match (&self.path, &self.text) {
            (Some(path), _) => format!("Exported {} item(s) to {}", self.items, path.display()),
            (None, Some(text)) => text.clone(),
            (None, None) => String::new(),
        }
    }
}

pub fn execute(command: ScratchCommands, config: &Config, json_mode: bool) -> Result<()> {
    let archive = SessionArchive::new(&config.persistence.data_dir);
    let mut pad = Scratchpad::from_items(
        archive
            .load_scratchpad()
            .context("Failed to read scratchpad")?,
    );

    match command {
        ScratchCommands::List => {
            output(
                &ScratchListOutput {
                    items: pad.into_items(),
                },
                json_mode,
            );
        }
        ScratchCommands::Add { text, source, note } => {
            let id = pad.add(&text, source, note);
            archive
                .save_scratchpad(pad.items())
                .context("Failed to write scratchpad")?;
            output(
                &ScratchChangeOutput {
                    action: "Saved",
                    id,
                    content: text,
                },
                json_mode,
            );
        }
        ScratchCommands::Remove { id } => {
            let removed = pad.remove(&id)?;
            archive
                .save_scratchpad(pad.items())
                .context("Failed to write scratchpad")?;
            output(
                &ScratchChangeOutput {
                    action: "Removed",
                    id: removed.id,
                    content: removed.content,
                },
                json_mode,
            );
        }
        ScratchCommands::Export { output: path } => {
            let text = pad.export_text();
            let written = match path {
                Some(path) => {
                    std::fs::write(&path, &text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    ScratchExportOutput {
                        items: pad.len(),
                        path: Some(path),
                        text: None,
                    }
                }
                None => ScratchExportOutput {
                    items: pad.len(),
                    path: None,
                    text: Some(text),
                },
            };
            output(&written, json_mode);
        }
    }
    Ok(())
}
