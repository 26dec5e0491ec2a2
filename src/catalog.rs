//! Artifact catalog: every `(path, category)` pair an output record references,
//! deduplicated by path and grouped by category in first-seen order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::logging::log_catalog_built;
use crate::preview::PreviewStrategy;
use crate::record::{OutputRecord, PayloadEntry};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: String,
    pub category: String,
}

impl ArtifactRef {
    pub fn new(path: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    pub category: String,
    pub paths: Vec<String>,
}

/// Read-only projection of one output record. Rebuilt, never patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<ArtifactRef>,
    groups: Vec<CategoryGroup>,
}

impl Catalog {
    pub fn from_record(record: &OutputRecord) -> Self {
        let pairs = record
            .payload()
            .into_iter()
            .filter_map(|(_, entry)| match entry {
                PayloadEntry::Artifacts(list) => Some(list),
                _ => None,
            })
            .flatten();
        let (catalog, dropped) = Self::from_pairs(pairs);
        log_catalog_built(&record.name, catalog.len(), catalog.groups.len(), dropped);
        catalog
    }

    /// First occurrence of a path wins; returns the catalog and the number of
    /// duplicates dropped.
    pub fn from_pairs(pairs: impl IntoIterator<Item = ArtifactRef>) -> (Self, usize) {
        let mut seen = HashSet::new();
        let mut dropped = 0;
        let mut catalog = Catalog::default();
        for artifact in pairs {
            if !seen.insert(artifact.path.clone()) {
                dropped += 1;
                continue;
            }
            match catalog
                .groups
                .iter_mut()
                .find(|g| g.category == artifact.category)
            {
                Some(group) => group.paths.push(artifact.path.clone()),
                None => catalog.groups.push(CategoryGroup {
                    category: artifact.category.clone(),
                    paths: vec![artifact.path.clone()],
                }),
            }
            catalog.entries.push(artifact);
        }
        (catalog, dropped)
    }

    /// Deduplicated artifacts in first-seen order.
    pub fn entries(&self) -> &[ArtifactRef] {
        &self.entries
    }

    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    pub fn paths(&self, category: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.category == category)
            .map(|g| g.paths.as_slice())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|a| a.path == path)
    }

    pub fn category_of(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.path == path)
            .map(|a| a.category.as_str())
    }

    pub fn first_image(&self) -> Option<&str> {
        self.entries
            .iter()
            .map(|a| a.path.as_str())
            .find(|p| PreviewStrategy::for_path(p) == PreviewStrategy::Image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(data: serde_json::Value) -> OutputRecord {
        OutputRecord::from_response("run", "/in.h5ad", json!({ "data": data })).unwrap()
    }

    #[test]
    fn test_duplicate_path_dropped() {
        let catalog = Catalog::from_record(&record(json!({
            "plots": [["/x/fig1.png", "QC"], ["/x/fig1.png", "QC"], ["/x/tbl.csv", "Tables"]]
        })));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.paths("QC").unwrap(), ["/x/fig1.png".to_string()]);
        assert_eq!(catalog.paths("Tables").unwrap(), ["/x/tbl.csv".to_string()]);
    }

    #[test]
    fn test_first_seen_order_across_keys() {
        let catalog = Catalog::from_record(&record(json!({
            "figs": [["/o/b.png", "Network Plots"], ["/o/a.png", "Heatmap"]],
            "files": [["/o/r.csv", "Results"], ["/o/c.png", "Network Plots"]],
        })));
        let cats: Vec<&str> = catalog.groups().iter().map(|g| g.category.as_str()).collect();
        assert_eq!(cats, vec!["Network Plots", "Heatmap", "Results"]);
        assert_eq!(
            catalog.paths("Network Plots").unwrap(),
            ["/o/b.png".to_string(), "/o/c.png".to_string()]
        );
        let order: Vec<&str> = catalog.entries().iter().map(|a| a.path.as_str()).collect();
        assert_eq!(order, vec!["/o/b.png", "/o/a.png", "/o/r.csv", "/o/c.png"]);
    }

    #[test]
    fn test_duplicate_keeps_first_category() {
        let catalog = Catalog::from_record(&record(json!({
            "figs": [["/o/a.png", "First"]],
            "files": [["/o/a.png", "Second"]],
        })));
        assert_eq!(catalog.category_of("/o/a.png"), Some("First"));
        assert!(catalog.paths("Second").is_none());
    }

    #[test]
    fn test_no_qualifying_arrays_is_empty() {
        let catalog = Catalog::from_record(&record(json!({
            "timestamp": "20250101_0000",
            "adata": {"path": "/in.h5ad", "n_obs": 1, "n_vars": 2},
            "used_annotators": ["cellmarker"],
        })));
        assert!(catalog.is_empty());
        assert!(catalog.first_image().is_none());
    }

    #[test]
    fn test_first_image_skips_non_images() {
        let catalog = Catalog::from_record(&record(json!({
            "files": [["/o/r.csv", "Results"], ["/o/notes.txt", "Notes"]],
            "figs": [["/o/heat.PNG", "Heatmap"], ["/o/net.png", "Network"]],
        })));
        assert_eq!(catalog.first_image(), Some("/o/heat.PNG"));
    }
}
