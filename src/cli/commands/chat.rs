//! `vessel chat` - the interactive conversation loop.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::adapters::backends::BackendRegistry;
use crate::adapters::embeddings::embedding_source_from_config;
use crate::cli::output::progress::{create_spinner, ProgressBarExt};
use crate::cli::output::{output, truncate, CommandOutput, TableFormatter};
use crate::domain::errors::TurnError;
use crate::domain::models::{
    Config, FatigueStatus, ParseKind, RhythmSignature, UnveiledPod, DEFAULT_URGENCY,
};
use crate::domain::ports::ArchiveStore;
use crate::infrastructure::persistence::SessionArchive;
use crate::services::{Scratchpad, Session, TurnReport};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Role whose ranked backends answer (defaults to backends.default_role)
    #[arg(short, long)]
    pub role: Option<String>,

    /// Label the session is archived under (defaults to the top-ranked backend)
    #[arg(long)]
    pub model_label: Option<String>,
}

/// In-loop commands, typed after a leading `/`.
#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    Pause,
    Resume,
    Pod(String),
    Pods,
    /// Save the given text, or the last reply when empty.
    Scratch(String),
    Reset,
    Help,
    Quit,
    Unknown(String),
}

/// Parse a line starting with `/`; `None` for ordinary messages.
pub fn parse_slash(line: &str) -> Option<SlashCommand> {
    let rest = line.trim().strip_prefix('/')?;
    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(n, a)| (n, a.trim()));
    Some(match name {
        "pause" => SlashCommand::Pause,
        "resume" => SlashCommand::Resume,
        "pod" if !arg.is_empty() => SlashCommand::Pod(arg.to_string()),
        "pods" => SlashCommand::Pods,
        "scratch" => SlashCommand::Scratch(arg.to_string()),
        "reset" => SlashCommand::Reset,
        "help" | "?" => SlashCommand::Help,
        "quit" | "exit" | "q" => SlashCommand::Quit,
        other => SlashCommand::Unknown(other.to_string()),
    })
}

const HELP: &str = "/pause  /resume  /pod <text>  /pods  /scratch [text]  /reset  /quit";

#[derive(Debug, Serialize)]
pub struct TurnView<'a> {
    pub index: usize,
    pub visible_text: &'a str,
    pub parse: ParseKind,
    pub backend: &'a str,
    pub fatigue: f64,
    pub status: FatigueStatus,
    pub alerts: Vec<String>,
    pub unveiled_pod: Option<&'a UnveiledPod>,
    pub tau_h: Option<f64>,
    pub alignment: Option<f64>,
    pub retries: u32,
}

impl<'a> From<&'a TurnReport> for TurnView<'a> {
    fn from(report: &'a TurnReport) -> Self {
        Self {
            index: report.index,
            visible_text: &report.visible_text,
            parse: report.parse,
            backend: &report.backend,
            fatigue: report.fatigue.score,
            status: report.fatigue.status(),
            alerts: report.residual_alerts.iter().map(ToString::to_string).collect(),
            unveiled_pod: report.unveiled_pod.as_ref(),
            tau_h: report.tau_h,
            alignment: report.alignment,
            retries: report.retries,
        }
    }
}

impl CommandOutput for TurnView<'_> {
    fn to_human(&self) -> String {
        let status = match self.status {
            FatigueStatus::Fresh => style(self.status.to_string()).green(),
            FatigueStatus::Soft => style(self.status.to_string()).yellow(),
            FatigueStatus::Hard => style(self.status.to_string()).red(),
        };
        let mut lines = vec![self.visible_text.to_string()];
        let mut meta = format!(
            "turn {} · {} · fatigue {:.3} ({status})",
            self.index, self.backend, self.fatigue
        );
        if let Some(tau) = self.tau_h {
            meta.push_str(&format!(" · τ {tau:.2}"));
        }
        if let Some(alignment) = self.alignment {
            meta.push_str(&format!(" · align {alignment:.2}"));
        }
        if self.retries > 0 {
            meta.push_str(&format!(" · retries {}", self.retries));
        }
        if self.parse == ParseKind::Degraded {
            meta.push_str(" · unstructured");
        }
        lines.push(style(format!("  ↳ {meta}")).dim().to_string());
        if let Some(pod) = self.unveiled_pod {
            lines.push(
                style(format!(
                    "  ↳ pod {} surfaced ({}, similarity {:.2}): {}",
                    pod.id.short(),
                    pod.condition,
                    pod.similarity,
                    pod.content
                ))
                .cyan()
                .to_string(),
            );
        }
        for alert in &self.alerts {
            lines.push(style(format!("  ↳ {alert}")).yellow().to_string());
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct TurnFailureView {
    pub error: String,
    pub attempts: usize,
    pub retries: u32,
}

impl CommandOutput for TurnFailureView {
    fn to_human(&self) -> String {
        let mut line = format!("✗ {}", self.error);
        if self.attempts > 0 {
            line.push_str(&format!(" ({} attempt(s), {} retries)", self.attempts, self.retries));
        }
        style(line).red().to_string()
    }
}

impl From<&TurnError> for TurnFailureView {
    fn from(error: &TurnError) -> Self {
        let diagnostics = error.diagnostics();
        Self {
            error: error.to_string(),
            attempts: diagnostics.map_or(0, |d| d.attempt_count()),
            retries: diagnostics.map_or(0, |d| d.retries),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub turns: usize,
    pub signature: RhythmSignature,
}

impl CommandOutput for SessionSummary {
    fn to_human(&self) -> String {
        let sig = &self.signature;
        format!(
            "Session {} archived: {} turn(s), mean fatigue {:.3}, peak {:.3}, {} ({})",
            truncate(&self.session_id, 11),
            self.turns,
            sig.mean_fatigue,
            sig.peak_fatigue,
            sig.dominant_rhythm,
            sig.fatigue_trend
        )
    }
}

#[derive(Debug, Serialize)]
struct Notice {
    notice: String,
}

impl CommandOutput for Notice {
    fn to_human(&self) -> String {
        style(&self.notice).dim().to_string()
    }
}

fn notice(text: impl Into<String>, json_mode: bool) {
    output(&Notice { notice: text.into() }, json_mode);
}

fn save_scratch(archive: &dyn ArchiveStore, content: String, source: String) -> Result<String> {
    let mut pad = Scratchpad::from_items(archive.load_scratchpad().context("Failed to read scratchpad")?);
    let id = pad.add(content, source, "");
    archive
        .save_scratchpad(pad.items())
        .context("Failed to write scratchpad")?;
    Ok(id)
}

pub async fn execute(args: ChatArgs, config: &Config, json_mode: bool) -> Result<()> {
    let registry = BackendRegistry::from_config(&config.backends, &config.rate_limit)
        .context("Failed to build backends")?;
    let role = args
        .role
        .unwrap_or_else(|| registry.default_role().to_string());
    let backends = registry
        .ranked(&role)
        .with_context(|| format!("Failed to resolve backends for role '{role}'"))?;
    let label = args.model_label.unwrap_or_else(|| {
        backends
            .first()
            .map_or_else(|| role.clone(), |b| b.name().to_string())
    });
    let embedder = embedding_source_from_config(&config.embedding)
        .context("Failed to build embedding source")?;
    let archive = Arc::new(SessionArchive::new(&config.persistence.data_dir));

    let mut session = Session::new(config, &role, label, backends, embedder)
        .with_archive(Arc::clone(&archive) as Arc<dyn ArchiveStore>)
        .context("Failed to restore archived session state")?;

    let mut intro = format!(
        "vessel session {} · role {} · {} latent pod(s)",
        truncate(session.id(), 11),
        session.role(),
        session.pods().latent_count()
    );
    if let Some(previous) = session.previous_rhythm() {
        intro.push_str(&format!(
            " · last session {} ({} turns)",
            previous.signature.dominant_rhythm, previous.signature.turns
        ));
    }
    if session.recapitulation().is_some() {
        intro.push_str(" · returning with prior context");
    }
    notice(intro, json_mode);
    notice(HELP, json_mode);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !json_mode {
            print!("{} ", style(">").bold());
            std::io::stdout().flush().ok();
        }
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = parse_slash(line) {
            match command {
                SlashCommand::Quit => break,
                SlashCommand::Pause => {
                    session.pause();
                    notice("paused; /resume to continue", json_mode);
                }
                SlashCommand::Resume => {
                    session.resume();
                    notice("resumed", json_mode);
                }
                SlashCommand::Pod(text) => match session.add_pod(&text, DEFAULT_URGENCY).await {
                    Ok(id) => notice(format!("stashed pod {}", id.short()), json_mode),
                    Err(e) => notice(format!("could not stash pod: {e}"), json_mode),
                },
                SlashCommand::Pods => {
                    let pods = session.pods().list();
                    if json_mode {
                        println!("{}", serde_json::to_string(&pods)?);
                    } else if pods.is_empty() {
                        notice("no pods", json_mode);
                    } else {
                        println!("{}", TableFormatter::new().format_pods(&pods));
                    }
                }
                SlashCommand::Scratch(text) => {
                    let last = session.store().last();
                    let (content, source) = match (text.is_empty(), last) {
                        (false, _) => (text, "user".to_string()),
                        (true, Some(turn)) => (turn.result.visible_text.clone(), turn.backend.clone()),
                        (true, None) => {
                            notice("nothing to save yet", json_mode);
                            continue;
                        }
                    };
                    match save_scratch(archive.as_ref(), content, source) {
                        Ok(id) => notice(format!("saved to scratchpad as {id}"), json_mode),
                        Err(e) => notice(format!("could not save to scratchpad: {e:#}"), json_mode),
                    }
                }
                SlashCommand::Reset => {
                    session.reset();
                    notice("fatigue, pulse, direction and breaker history cleared", json_mode);
                }
                SlashCommand::Help => notice(HELP, json_mode),
                SlashCommand::Unknown(name) => {
                    notice(format!("unknown command /{name}; {HELP}"), json_mode);
                }
            }
            continue;
        }

        let spinner = create_spinner("thinking", json_mode);
        let result = session.turn(line).await;
        spinner.finish_quietly();
        match result {
            Ok(report) => output(&TurnView::from(&report), json_mode),
            Err(error) => {
                warn!(error = %error, "Turn aborted");
                output(&TurnFailureView::from(&error), json_mode);
            }
        }
    }

    let signature = session.end().context("Failed to archive session")?;
    output(
        &SessionSummary {
            session_id: session.id().to_string(),
            turns: session.store().len(),
            signature,
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(parse_slash("hello"), None);
        assert_eq!(parse_slash("/pause"), Some(SlashCommand::Pause));
        assert_eq!(
            parse_slash("/pod  remember the lighthouse "),
            Some(SlashCommand::Pod("remember the lighthouse".to_string()))
        );
        assert_eq!(parse_slash("/pod"), Some(SlashCommand::Unknown("pod".to_string())));
        assert_eq!(parse_slash("/exit"), Some(SlashCommand::Quit));
        assert_eq!(parse_slash("/scratch"), Some(SlashCommand::Scratch(String::new())));
        assert_eq!(
            parse_slash("/scratch keep this"),
            Some(SlashCommand::Scratch("keep this".to_string()))
        );
        assert_eq!(parse_slash("/dance"), Some(SlashCommand::Unknown("dance".to_string())));
    }

    #[test]
    fn test_failure_view_without_diagnostics() {
        let view = TurnFailureView::from(&TurnError::Paused);
        assert_eq!(view.attempts, 0);
        assert!(view.error.contains("paused"));
    }
}
