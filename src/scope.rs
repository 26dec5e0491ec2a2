//! Two-level (category → label) multi-select used to scope follow-up jobs.
//!
//! The universe is the active dataset summary's `label_counts`. Selected
//! identifiers are kept in insertion order so the decoded label list sent to
//! the backend is deterministic.

use std::fmt;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::record::SummaryDatum;

pub const SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId {
    pub category: String,
    pub label: String,
}

impl ScopeId {
    pub fn new(category: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
        }
    }

    /// `category::label`
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.category, SEPARATOR, self.label)
    }

    pub fn decode(id: &str) -> Option<Self> {
        id.split_once(SEPARATOR)
            .map(|(category, label)| Self::new(category, label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    All,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Unchecked,
    Indeterminate,
}

/// Collapsed text shown in the closed control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDisplay {
    None,
    All,
    Count(usize),
}

impl fmt::Display for ScopeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeDisplay::None => write!(f, "None"),
            ScopeDisplay::All => write!(f, "All"),
            ScopeDisplay::Count(n) => write!(f, "{} selected", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ScopeCategory {
    name: String,
    labels: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeSelector {
    owner: Option<String>,
    universe: Vec<ScopeCategory>,
    selected: Vec<ScopeId>,
    expanded: Option<String>,
}

impl ScopeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_summary(summary: Option<&SummaryDatum>) -> Self {
        let mut selector = Self::new();
        selector.rebind(summary);
        selector
    }

    /// Follow the owning summary. A different dataset starts from an empty,
    /// collapsed selection; the same dataset with a changed taxonomy keeps
    /// only the identifiers that still exist.
    pub fn rebind(&mut self, summary: Option<&SummaryDatum>) {
        let owner = summary.map(|s| s.path.clone());
        let universe: Vec<ScopeCategory> = summary
            .map(|s| {
                s.label_counts
                    .categories()
                    .iter()
                    .map(|c| ScopeCategory {
                        name: c.name.clone(),
                        labels: c.labels.iter().map(|(l, _)| l.clone()).collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if owner != self.owner {
            self.selected.clear();
            self.expanded = None;
        }
        self.owner = owner;
        self.universe = universe;

        let before = self.selected.len();
        let universe = &self.universe;
        self.selected.retain(|id| contains(universe, id));
        if let Some(cat) = &self.expanded {
            if !self.universe.iter().any(|c| &c.name == cat) {
                self.expanded = None;
            }
        }
        if before != self.selected.len() {
            log(
                Level::Debug,
                Domain::Scope,
                "purged",
                obj(&[("dropped", serde_json::json!(before - self.selected.len()))]),
            );
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.universe.iter().map(|c| c.name.as_str())
    }

    pub fn labels(&self, category: &str) -> &[String] {
        self.universe
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.labels.as_slice())
            .unwrap_or(&[])
    }

    /// Every selectable identifier, category by category.
    pub fn universe(&self) -> Vec<ScopeId> {
        self.universe
            .iter()
            .flat_map(|c| c.labels.iter().map(move |l| ScopeId::new(c.name.clone(), l.clone())))
            .collect()
    }

    fn universe_len(&self) -> usize {
        self.universe.iter().map(|c| c.labels.len()).sum()
    }

    pub fn selected(&self) -> &[ScopeId] {
        &self.selected
    }

    pub fn is_selected(&self, id: &ScopeId) -> bool {
        self.selected.contains(id)
    }

    pub fn expanded(&self) -> Option<&str> {
        self.expanded.as_deref()
    }

    /// Expand `category`, collapsing any other; collapse if it was open.
    pub fn toggle_category(&mut self, category: &str) {
        if self.expanded.as_deref() == Some(category) {
            self.expanded = None;
        } else if self.universe.iter().any(|c| c.name == category) {
            self.expanded = Some(category.to_string());
        }
    }

    /// Identifiers outside the universe are ignored.
    pub fn toggle_item(&mut self, id: &ScopeId) {
        if let Some(pos) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(pos);
        } else if contains(&self.universe, id) {
            self.selected.push(id.clone());
        }
    }

    /// Clear the category if it is fully selected, otherwise fill it in.
    pub fn toggle_whole_category(&mut self, category: &str) {
        let ids: Vec<ScopeId> = self
            .labels(category)
            .iter()
            .map(|l| ScopeId::new(category, l.clone()))
            .collect();
        if ids.is_empty() {
            return;
        }
        if ids.iter().all(|id| self.selected.contains(id)) {
            self.selected.retain(|id| id.category != category);
        } else {
            for id in ids {
                if !self.selected.contains(&id) {
                    self.selected.push(id);
                }
            }
        }
        log(
            Level::Debug,
            Domain::Scope,
            "category_toggled",
            obj(&[("category", v_str(category))]),
        );
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.selected = match preset {
            Preset::All => self.universe(),
            Preset::None => Vec::new(),
        };
    }

    pub fn display(&self) -> ScopeDisplay {
        match self.selected.len() {
            0 => ScopeDisplay::None,
            n if n == self.universe_len() => ScopeDisplay::All,
            n => ScopeDisplay::Count(n),
        }
    }

    /// Empty categories render unchecked.
    pub fn category_check(&self, category: &str) -> CheckState {
        let labels = self.labels(category);
        let selected = labels
            .iter()
            .filter(|l| {
                self.selected
                    .iter()
                    .any(|id| id.category == category && &id.label == *l)
            })
            .count();
        check_state(selected, labels.len())
    }

    /// State of the "All" preset row.
    pub fn preset_check(&self) -> CheckState {
        check_state(self.selected.len(), self.universe_len())
    }

    /// Raw labels in selection order, as the backend expects them.
    pub fn decoded_labels(&self) -> Vec<String> {
        self.selected.iter().map(|id| id.label.clone()).collect()
    }
}

fn contains(universe: &[ScopeCategory], id: &ScopeId) -> bool {
    universe
        .iter()
        .any(|c| c.name == id.category && c.labels.contains(&id.label))
}

fn check_state(selected: usize, total: usize) -> CheckState {
    if total == 0 || selected == 0 {
        CheckState::Unchecked
    } else if selected == total {
        CheckState::Checked
    } else {
        CheckState::Indeterminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(path: &str, label_counts: serde_json::Value) -> SummaryDatum {
        serde_json::from_value(json!({
            "path": path,
            "n_obs": 22,
            "n_vars": 100,
            "label_counts": label_counts,
        }))
        .unwrap()
    }

    fn tissue_summary() -> SummaryDatum {
        summary(
            "/d/a.h5ad",
            json!({"CellType": {"Tcell": 10, "Bcell": 5}, "Tissue": {"Lung": 7}}),
        )
    }

    fn encoded(selector: &ScopeSelector) -> Vec<String> {
        selector.selected().iter().map(ScopeId::encode).collect()
    }

    #[test]
    fn test_preset_all_then_whole_category() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.apply_preset(Preset::All);
        assert_eq!(encoded(&s), vec!["CellType::Tcell", "CellType::Bcell", "Tissue::Lung"]);
        assert_eq!(s.display(), ScopeDisplay::All);

        s.toggle_whole_category("CellType");
        assert_eq!(encoded(&s), vec!["Tissue::Lung"]);
        assert_eq!(s.display().to_string(), "1 selected");
    }

    #[test]
    fn test_preset_none_empties() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.apply_preset(Preset::All);
        s.apply_preset(Preset::None);
        assert!(s.selected().is_empty());
        assert_eq!(s.display().to_string(), "None");
    }

    #[test]
    fn test_whole_category_self_inverse_from_partial() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.toggle_item(&ScopeId::new("CellType", "Bcell"));
        assert_eq!(s.category_check("CellType"), CheckState::Indeterminate);

        s.toggle_whole_category("CellType");
        assert_eq!(s.category_check("CellType"), CheckState::Checked);
        s.toggle_whole_category("CellType");
        assert_eq!(s.category_check("CellType"), CheckState::Unchecked);
    }

    #[test]
    fn test_whole_category_twice_restores_full_state() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.toggle_item(&ScopeId::new("Tissue", "Lung"));
        s.toggle_whole_category("Tissue");
        s.toggle_whole_category("Tissue");
        assert_eq!(encoded(&s), vec!["Tissue::Lung"]);
    }

    #[test]
    fn test_expansion_is_exclusive() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        assert_eq!(s.expanded(), None);
        s.toggle_category("CellType");
        assert_eq!(s.expanded(), Some("CellType"));
        s.toggle_category("Tissue");
        assert_eq!(s.expanded(), Some("Tissue"));
        s.toggle_category("Tissue");
        assert_eq!(s.expanded(), None);
    }

    #[test]
    fn test_toggle_item_leaves_expansion() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.toggle_category("CellType");
        s.toggle_item(&ScopeId::new("CellType", "Tcell"));
        s.toggle_item(&ScopeId::new("Nope", "Tcell"));
        assert_eq!(s.expanded(), Some("CellType"));
        assert_eq!(encoded(&s), vec!["CellType::Tcell"]);
        s.toggle_item(&ScopeId::new("CellType", "Tcell"));
        assert!(s.selected().is_empty());
    }

    #[test]
    fn test_new_summary_resets_selection() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.apply_preset(Preset::All);
        s.toggle_category("Tissue");
        s.rebind(Some(&summary("/d/b.h5ad", json!({"CellType": {"Tcell": 3}}))));
        assert!(s.selected().is_empty());
        assert_eq!(s.expanded(), None);
    }

    #[test]
    fn test_same_owner_changed_universe_purges_stale_ids() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.apply_preset(Preset::All);
        s.toggle_category("Tissue");
        s.rebind(Some(&summary("/d/a.h5ad", json!({"CellType": {"Tcell": 10}}))));
        assert_eq!(encoded(&s), vec!["CellType::Tcell"]);
        assert_eq!(s.expanded(), None);
        assert_eq!(s.display(), ScopeDisplay::All);
    }

    #[test]
    fn test_no_summary_means_empty_universe() {
        let mut s = ScopeSelector::for_summary(None);
        s.apply_preset(Preset::All);
        assert!(s.selected().is_empty());
        assert_eq!(s.display(), ScopeDisplay::None);
        assert_eq!(s.preset_check(), CheckState::Unchecked);
    }

    #[test]
    fn test_decoded_labels_and_id_codec() {
        let mut s = ScopeSelector::for_summary(Some(&tissue_summary()));
        s.toggle_item(&ScopeId::new("Tissue", "Lung"));
        s.toggle_item(&ScopeId::new("CellType", "Tcell"));
        assert_eq!(s.decoded_labels(), vec!["Lung", "Tcell"]);
        assert_eq!(
            ScopeId::decode("CellType::CD4::naive"),
            Some(ScopeId::new("CellType", "CD4::naive"))
        );
        assert_eq!(ScopeId::decode("plain"), None);
    }
}
