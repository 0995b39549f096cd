//! `vessel pods` - inspect and stash latent pods between sessions.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use crate::adapters::embeddings::embedding_source_from_config;
use crate::cli::output::{output, truncate, CommandOutput, TableFormatter};
use crate::domain::models::{Config, Pod, PodId, DEFAULT_URGENCY};
use crate::domain::ports::ArchiveStore;
use crate::infrastructure::persistence::SessionArchive;
use crate::services::PodSpace;

#[derive(Subcommand, Debug)]
pub enum PodCommands {
    /// List archived pods
    List,

    /// Stash a new pod; it surfaces when the conversation comes near it
    Add {
        /// Pod content (also used as its trigger text)
        text: String,

        /// Tie-break weight among equally similar pods
        #[arg(short, long, default_value_t = DEFAULT_URGENCY)]
        urgency: f64,
    },
}

#[derive(Debug, Serialize)]
pub struct PodListOutput {
    pub pods: Vec<Pod>,
}

impl CommandOutput for PodListOutput {
    fn to_human(&self) -> String {
        if self.pods.is_empty() {
            return "No pods stashed.".to_string();
        }
        let refs: Vec<&Pod> = self.pods.iter().collect();
        format!(
            "{}\n{} pod(s)",
            TableFormatter::new().format_pods(&refs),
            refs.len()
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PodAddOutput {
    pub id: PodId,
    pub content: String,
    pub urgency: f64,
}

impl CommandOutput for PodAddOutput {
    fn to_human(&self) -> String {
        format!(
            "Stashed pod {}: {}",
            self.id.short(),
            truncate(&self.content, 60)
        )
    }
}

pub async fn execute(command: PodCommands, config: &Config, json_mode: bool) -> Result<()> {
    let archive = SessionArchive::new(&config.persistence.data_dir);
    let mut pods = PodSpace::new(&config.pods);
    pods.restore(archive.load_pods().context("Failed to read pod archive")?);

    match command {
        PodCommands::List => {
            let listed = pods.list().into_iter().cloned().collect();
            output(&PodListOutput { pods: listed }, json_mode);
        }
        PodCommands::Add { text, urgency } => {
            let embedder = embedding_source_from_config(&config.embedding)
                .context("Failed to build embedding source")?;
            let trigger = embedder
                .embed(&text)
                .await
                .context("Failed to embed pod content")?;
            let id = pods.create_with_urgency(&text, trigger, urgency);
            archive
                .save_pods(&pods.archive())
                .context("Failed to write pod archive")?;
            output(
                &PodAddOutput {
                    id,
                    content: text,
                    urgency,
                },
                json_mode,
            );
        }
    }
    Ok(())
}
