//! Pizza menu
//!
//! The menu is injected configuration. It feeds the menu-membership validator,
//! the pattern extractor's lookup table, and the "what's on the menu" reply.

use serde::{Deserialize, Serialize};

/// One menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default)]
    pub ingredients: String,
}

/// Ordered list of menu entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Menu {
    items: Vec<MenuItem>,
}

impl Menu {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Exact membership check
    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|i| i.name == name)
    }

    /// Case-insensitive lookup returning the canonical entry
    pub fn find(&self, name: &str) -> Option<&MenuItem> {
        let wanted = name.trim().to_lowercase();
        self.items.iter().find(|i| i.name.to_lowercase() == wanted)
    }

    /// Human-readable listing under `header`
    pub fn listing(&self, header: &str) -> String {
        let mut text = header.to_string();
        for item in &self.items {
            if item.ingredients.is_empty() {
                text.push_str(&format!("\n - {}", item.name));
            } else {
                text.push_str(&format!(
                    "\n - {} with the following ingredients: {}",
                    item.name, item.ingredients
                ));
            }
        }
        text
    }
}
