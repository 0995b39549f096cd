//! Table output formatting for CLI commands
//!
//! Pods, rhythm entries and scratchpad items rendered with comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{DominantRhythm, Pod, PodState, RhythmIndexEntry, ScratchItem};

use super::truncate;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format pods as a table
    pub fn format_pods(&self, pods: &[&Pod]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "State", "Urgency", "Created", "Content"]));

        for pod in pods {
            let state_cell = if self.use_colors {
                Cell::new(pod.state.to_string()).fg(match pod.state {
                    PodState::Latent => Color::Cyan,
                    PodState::Unveiled => Color::Green,
                })
            } else {
                Cell::new(pod.state.to_string())
            };
            table.add_row(vec![
                Cell::new(pod.id.short()),
                state_cell,
                Cell::new(format!("{:.2}", pod.urgency)),
                Cell::new(pod.created_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(truncate(&pod.content, 50)),
            ]);
        }

        table.to_string()
    }

    /// Format scratchpad items as a table
    pub fn format_scratch(&self, items: &[ScratchItem]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Source", "Created", "Note", "Content"]));

        for item in items {
            table.add_row(vec![
                Cell::new(&item.id),
                Cell::new(&item.source),
                Cell::new(item.created_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(truncate(&item.note, 20)),
                Cell::new(truncate(&item.content, 50)),
            ]);
        }

        table.to_string()
    }

    /// Format rhythm index entries as a table
    pub fn format_rhythm(&self, entries: &[&RhythmIndexEntry]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "Session", "Model", "Ended", "Turns", "Mean", "Peak", "Trend", "Rhythm",
        ]));

        for entry in entries {
            let sig = &entry.signature;
            let rhythm_cell = if self.use_colors {
                Cell::new(sig.dominant_rhythm.to_string()).fg(rhythm_color(sig.dominant_rhythm))
            } else {
                Cell::new(sig.dominant_rhythm.to_string())
            };
            table.add_row(vec![
                Cell::new(truncate(&entry.session_id, 11)),
                Cell::new(&entry.model),
                Cell::new(entry.ended_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(sig.turns),
                Cell::new(format!("{:.3}", sig.mean_fatigue)),
                Cell::new(format!("{:.3}", sig.peak_fatigue)),
                Cell::new(sig.fatigue_trend.to_string()),
                rhythm_cell,
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

fn rhythm_color(rhythm: DominantRhythm) -> Color {
    match rhythm {
        DominantRhythm::Fatiguing => Color::Red,
        DominantRhythm::Recovered | DominantRhythm::Exploratory => Color::Green,
        DominantRhythm::Reflective | DominantRhythm::ReflectiveWithBurst => Color::Cyan,
        DominantRhythm::Steady | DominantRhythm::Empty => Color::Reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EmbeddingVector;

    #[test]
    fn test_pod_table_contains_short_id() {
        let pod = Pod::new("remember the lighthouse", EmbeddingVector::new(vec![1.0]), 1.0);
        let rendered = TableFormatter::with_config(false, Some(120)).format_pods(&[&pod]);
        assert!(rendered.contains(&pod.id.short()));
        assert!(rendered.contains("latent"));
    }

    #[test]
    fn test_scratch_table_shows_id_and_source() {
        let mut pad = crate::services::Scratchpad::default();
        let id = pad.add("keep this", "llama3", "");
        let rendered = TableFormatter::with_config(false, Some(120)).format_scratch(pad.items());
        assert!(rendered.contains(&id));
        assert!(rendered.contains("llama3"));
        assert!(rendered.contains("keep this"));
    }
}
