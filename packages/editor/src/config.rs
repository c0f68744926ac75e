//! # Editor Configuration
//!
//! Everything the editor needs from its host that is not part of the
//! document: the section category catalog, history depth, statistics
//! requirements and feature toggles.
//!
//! ```rust
//! use manuscript_editor::EditorConfig;
//!
//! let config = EditorConfig::from_json(r#"{ "historyDepth": 20 }"#).unwrap();
//! assert_eq!(config.history_depth, 20);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Key the id generator seed is derived from
    pub document_key: String,

    /// Maximum number of undo levels (0 = unlimited)
    pub history_depth: usize,

    /// Whether inconsistency warnings are decorated from the start
    pub show_inconsistency_decorations: bool,

    /// Whether user transactions are handed to the change recorder
    pub track_changes: bool,

    pub section_categories: SectionCategoryCatalog,

    pub requirements: StatisticsRequirements,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            document_key: "manuscript".to_string(),
            history_depth: 100,
            show_inconsistency_decorations: false,
            track_changes: false,
            section_categories: SectionCategoryCatalog::default(),
            requirements: StatisticsRequirements::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.requirements.validate()?;
        for (id, category) in self.section_categories.iter() {
            if category.group_ids.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "section category '{}' belongs to no group",
                    id
                )));
            }
        }
        Ok(())
    }
}

/// Structural context a section lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionGroup {
    Abstracts,
    Body,
    Backmatter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCategory {
    pub name: String,

    #[serde(rename = "groupIDs")]
    pub group_ids: Vec<SectionGroup>,

    #[serde(default = "default_true")]
    pub is_editable: bool,

    /// Titles a section of this category may carry; empty means any
    #[serde(default)]
    pub titles: Vec<String>,

    /// At most one section per group may use the category
    #[serde(default)]
    pub is_unique: bool,
}

fn default_true() -> bool {
    true
}

/// Category id → definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionCategoryCatalog {
    categories: BTreeMap<String, SectionCategory>,
}

impl SectionCategoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, category: SectionCategory) {
        self.categories.insert(id.into(), category);
    }

    pub fn with(mut self, id: impl Into<String>, category: SectionCategory) -> Self {
        self.insert(id, category);
        self
    }

    pub fn get(&self, id: &str) -> Option<&SectionCategory> {
        self.categories.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionCategory)> {
        self.categories.iter().map(|(id, c)| (id.as_str(), c))
    }

    /// Categories assignable within a group
    pub fn in_group(&self, group: SectionGroup) -> impl Iterator<Item = (&str, &SectionCategory)> {
        self.iter().filter(move |(_, c)| c.group_ids.contains(&group))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Word / character bounds the manuscript must satisfy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatisticsRequirements {
    pub min_words: Option<usize>,
    pub max_words: Option<usize>,
    pub min_characters: Option<usize>,
    pub max_characters: Option<usize>,
}

impl StatisticsRequirements {
    fn validate(&self) -> Result<(), ConfigError> {
        let bounds = [
            ("words", self.min_words, self.max_words),
            ("characters", self.min_characters, self.max_characters),
        ];
        for (name, min, max) in bounds {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(ConfigError::Invalid(format!(
                        "minimum {} ({}) exceeds maximum ({})",
                        name, min, max
                    )));
                }
            }
        }
        Ok(())
    }
}
