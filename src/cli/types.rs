//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::cli::commands::chat::ChatArgs;
use crate::cli::commands::config::ConfigCommands;
use crate::cli::commands::pods::PodCommands;
use crate::cli::commands::rhythm::RhythmArgs;
use crate::cli::commands::scratch::ScratchCommands;

#[derive(Parser, Debug)]
#[command(name = "vessel")]
#[command(
    about = "Vessel - fatigue-aware conversational orchestrator",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .vessel/
    #[arg(short, long, global = true, env = "VESSEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive conversation
    Chat(ChatArgs),

    /// Manage latent pods
    #[command(subcommand)]
    Pods(PodCommands),

    /// Show archived session rhythm signatures
    Rhythm(RhythmArgs),

    /// Manage the scratchpad of saved snippets
    #[command(subcommand)]
    Scratch(ScratchCommands),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

impl Cli {
    /// Level override implied by `-v` flags.
    pub fn log_level_override(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info"),
            2 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
