//! User-curated scratchpad shared across models.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ScratchItem, SCRATCH_ID_LEN};

/// Snippets the user saved on purpose, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Scratchpad {
    items: Vec<ScratchItem>,
}

impl Scratchpad {
    /// Scratchpad over previously saved items.
    pub fn from_items(items: Vec<ScratchItem>) -> Self {
        Self { items }
    }

    /// Saved items.
    pub fn items(&self) -> &[ScratchItem] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is saved.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Save a snippet and return its short id.
    pub fn add(
        &mut self,
        content: impl Into<String>,
        source: impl Into<String>,
        note: impl Into<String>,
    ) -> String {
        let id: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(SCRATCH_ID_LEN)
            .collect();
        self.items.push(ScratchItem {
            id: id.clone(),
            content: content.into(),
            source: source.into(),
            note: note.into(),
            created_at: Utc::now(),
        });
        id
    }

    /// Remove the item with this id.
    pub fn remove(&mut self, id: &str) -> DomainResult<ScratchItem> {
        let position = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| DomainError::ScratchNotFound(id.to_string()))?;
        Ok(self.items.remove(position))
    }

    /// Plain-text export, one block per item.
    pub fn export_text(&self) -> String {
        let mut lines = vec![
            "# Vessel scratchpad export".to_string(),
            format!("# {}", Utc::now().to_rfc3339()),
            String::new(),
        ];
        for item in &self.items {
            lines.push(format!("--- [{}] {} ---", item.source, item.note));
            lines.push(item.content.clone());
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// Items for persistence.
    pub fn into_items(self) -> Vec<ScratchItem> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let mut pad = Scratchpad::default();
        let id = pad.add("fn main() {}", "llama3", "snippet");
        assert_eq!(id.len(), SCRATCH_ID_LEN);
        assert_eq!(pad.len(), 1);
        let removed = pad.remove(&id).unwrap();
        assert_eq!(removed.content, "fn main() {}");
        assert!(pad.is_empty());
        assert!(matches!(pad.remove(&id), Err(DomainError::ScratchNotFound(_))));
    }

    #[test]
    fn test_export_lists_items_in_order() {
        let mut pad = Scratchpad::default();
        pad.add("first", "llama3", "a");
        pad.add("second", "", "");
        let text = pad.export_text();
        let first = text.find("--- [llama3] a ---\nfirst").unwrap();
        let second = text.find("--- []  ---\nsecond").unwrap();
        assert!(first < second);
    }
}
