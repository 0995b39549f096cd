//! `vessel config` - show or validate the merged configuration.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Check the configuration and report problems
    Validate,
}

#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    #[serde(flatten)]
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValidateOutput {
    pub valid: bool,
    pub error: Option<String>,
    pub default_role: String,
    pub models: Vec<String>,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        match &self.error {
            Some(error) => format!("Configuration is invalid: {error}"),
            None => format!(
                "Configuration is valid.\n  default role: {}\n  models: {}",
                self.default_role,
                self.models.join(", ")
            ),
        }
    }
}

pub fn execute(command: ConfigCommands, config: &Config, json_mode: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            output(
                &ConfigShowOutput {
                    config: config.clone(),
                },
                json_mode,
            );
            Ok(())
        }
        ConfigCommands::Validate => {
            let result = ConfigLoader::validate(config);
            let report = ConfigValidateOutput {
                valid: result.is_ok(),
                error: result.as_ref().err().map(ToString::to_string),
                default_role: config.backends.default_role.clone(),
                models: config.backends.models.iter().map(|m| m.name.clone()).collect(),
            };
            output(&report, json_mode);
            result.context("Configuration validation failed")
        }
    }
}
