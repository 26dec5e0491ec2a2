use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::Catalog;
use crate::logging::{log_rejected_selection, log_selection};

/// What the preview area currently shows for one output record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    Unselected,
    /// The structured dataset summary
    Summary,
    Artifact(String),
}

impl Selection {
    pub fn path(&self) -> Option<&str> {
        match self {
            Selection::Artifact(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Unselected => write!(f, "unselected"),
            Selection::Summary => write!(f, "summary"),
            Selection::Artifact(path) => write!(f, "{}", path),
        }
    }
}

/// Single current reference for one output record view.
///
/// The default rule runs once per record, right after [`SelectionModel::reset`];
/// afterwards only explicit selects change the state.
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    current: Selection,
    record: String,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Selection {
        &self.current
    }

    /// Record switch: the previous choice is dropped and the default rule
    /// decides from scratch.
    pub fn reset(&mut self, record: &str, catalog: &Catalog, has_summary: bool) {
        self.record = record.to_string();
        self.current = if has_summary {
            Selection::Summary
        } else if let Some(path) = catalog.first_image() {
            Selection::Artifact(path.to_string())
        } else {
            Selection::Unselected
        };
        log_selection(&self.record, &self.current.to_string(), "default");
    }

    /// Returns whether the selection changed. Targets that are neither in the
    /// catalog nor an available summary are ignored.
    pub fn select(&mut self, target: Selection, catalog: &Catalog, has_summary: bool) -> bool {
        let valid = match &target {
            Selection::Unselected => false,
            Selection::Summary => has_summary,
            Selection::Artifact(path) => catalog.contains(path),
        };
        if !valid {
            log_rejected_selection(&self.record, &target.to_string());
            return false;
        }
        if self.current == target {
            return false;
        }
        self.current = target;
        log_selection(&self.record, &self.current.to_string(), "user");
        true
    }
}
