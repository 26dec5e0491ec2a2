//! Job output records and the validating parse of their loosely-typed payload.
//!
//! The backend answers every job with a JSON object whose `data` map mixes
//! artifact lists (`[[path, category], ...]`), a dataset summary object and
//! assorted scalars. [`OutputRecord::payload`] sorts each top-level value into
//! one of the known shapes once, so nothing downstream sniffs raw JSON.

use anyhow::{Context, Result};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

use crate::catalog::ArtifactRef;

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("job response is not a JSON object")]
    NotAnObject,
    #[error("malformed job response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Body of a job response as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    /// Artifact lists, summary and scalars keyed by backend-chosen names
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub name: String,
    pub data: RecordData,
    /// Path of the input dataset the job ran on
    pub input: String,
}

/// One top-level value of `data.data`, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadEntry<'a> {
    Artifacts(Vec<ArtifactRef>),
    Summary(Box<SummaryDatum>),
    Other(&'a Value),
}

impl OutputRecord {
    pub fn new(name: impl Into<String>, input: impl Into<String>, data: RecordData) -> Self {
        Self {
            name: name.into(),
            data,
            input: input.into(),
        }
    }

    /// Build a record from a raw job response object.
    pub fn from_response(
        name: impl Into<String>,
        input: impl Into<String>,
        response: Value,
    ) -> Result<Self, RecordError> {
        if !response.is_object() {
            return Err(RecordError::NotAnObject);
        }
        let data: RecordData = serde_json::from_value(response)?;
        Ok(Self::new(name, input, data))
    }

    /// Load a saved record (`{name, data, input}`) from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading output record {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing output record {}", path.display()))
    }

    pub fn payload(&self) -> Vec<(&str, PayloadEntry<'_>)> {
        self.data
            .data
            .iter()
            .map(|(key, value)| (key.as_str(), classify_value(value)))
            .collect()
    }

    /// First summary-shaped value of the payload, if any.
    pub fn summary(&self) -> Option<SummaryDatum> {
        self.data.data.values().find_map(parse_summary)
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.data.params.as_ref().and_then(Value::as_object)
    }

    /// Stable fingerprint used in logs.
    pub fn digest(&self) -> String {
        let raw = serde_json::to_string(self).unwrap_or_default();
        crate::logging::content_digest(&raw)
    }
}

fn classify_value(value: &Value) -> PayloadEntry<'_> {
    if let Some(artifacts) = parse_artifact_list(value) {
        return PayloadEntry::Artifacts(artifacts);
    }
    match parse_summary(value) {
        Some(summary) => PayloadEntry::Summary(Box::new(summary)),
        None => PayloadEntry::Other(value),
    }
}

/// An array qualifies only when every element is a `[path, category]` string pair.
pub fn parse_artifact_list(value: &Value) -> Option<Vec<ArtifactRef>> {
    let items = value.as_array()?;
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(path), Value::String(category)]) => {
                Some(ArtifactRef::new(path.clone(), category.clone()))
            }
            _ => None,
        })
        .collect()
}

fn parse_summary(value: &Value) -> Option<SummaryDatum> {
    let object = value.as_object()?;
    let shaped = object.get("path").map_or(false, Value::is_string)
        && object.get("n_obs").map_or(false, Value::is_number)
        && object.get("n_vars").map_or(false, Value::is_number);
    if !shaped {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

// =============================================================================
// Dataset summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDatum {
    pub path: String,
    #[serde(deserialize_with = "lenient_count")]
    pub n_obs: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub n_vars: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preprocessed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub obs_columns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub var_columns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub obs_preview: Vec<Row>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub var_preview: Vec<Row>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<Row>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label_counts: LabelCounts,
}

/// Simple header + string cells view of a list of row objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SummaryDatum {
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    pub fn cell_label(&self) -> String {
        format!("{} cells", self.n_obs)
    }

    pub fn gene_label(&self) -> String {
        format!("{} genes", self.n_vars)
    }

    pub fn state_label(&self) -> &'static str {
        if self.preprocessed {
            "pre-processed"
        } else {
            "raw"
        }
    }

    /// Per category, labels ordered by descending count (ties keep backend order).
    pub fn sorted_label_counts(&self) -> Vec<LabelCategory> {
        self.label_counts
            .categories()
            .iter()
            .map(|cat| {
                let mut labels = cat.labels.clone();
                labels.sort_by(|a, b| b.1.cmp(&a.1));
                LabelCategory {
                    name: cat.name.clone(),
                    labels,
                }
            })
            .collect()
    }

    /// Headers come from the first row's keys; missing cells render empty.
    pub fn table(rows: &[Row]) -> RowTable {
        let Some(first) = rows.first() else {
            return RowTable::default();
        };
        let headers: Vec<String> = first.keys().cloned().collect();
        let rows = rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|h| row.get(h).map(render_cell).unwrap_or_default())
                    .collect()
            })
            .collect();
        RowTable { headers, rows }
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Last path segment, accepting both separators.
pub fn file_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

// =============================================================================
// Label taxonomy
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LabelCategory {
    pub name: String,
    /// (label, count) in backend order
    pub labels: Vec<(String, u64)>,
}

/// `category -> (label -> count)` keeping the backend's key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelCounts(Vec<LabelCategory>);

impl LabelCounts {
    pub fn new(categories: Vec<LabelCategory>) -> Self {
        Self(categories)
    }

    pub fn categories(&self) -> &[LabelCategory] {
        &self.0
    }

    pub fn get(&self, category: &str) -> Option<&LabelCategory> {
        self.0.iter().find(|c| c.name == category)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for LabelCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let categories = raw
            .into_iter()
            .map(|(name, labels)| {
                let labels = labels
                    .as_object()
                    .map(|m| {
                        m.iter()
                            .map(|(label, count)| (label.clone(), count_of(count)))
                            .collect()
                    })
                    .unwrap_or_default();
                LabelCategory { name, labels }
            })
            .collect();
        Ok(Self(categories))
    }
}

impl Serialize for LabelCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for cat in &self.0 {
            let labels: Map<String, Value> = cat
                .labels
                .iter()
                .map(|(label, count)| (label.clone(), Value::from(*count)))
                .collect();
            map.serialize_entry(&cat.name, &labels)?;
        }
        map.end()
    }
}

fn count_of(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
        .unwrap_or(0)
}

/// Counts arrive as integers or as whole floats (`2700.0`) depending on the
/// numpy dtype on the backend.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_number() {
        return Err(serde::de::Error::custom("count must be a number"));
    }
    Ok(count_of(&value))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary_json() -> Value {
        json!({
            "path": "/data/pbmc.h5ad",
            "n_obs": 2700,
            "n_vars": 32738,
            "preprocessed": true,
            "obs_preview": [{"index": "AAAC-1", "n_genes": 781}],
            "var_preview": [],
            "clusters": null,
            "label_counts": {
                "cellmarker": {"T cell": 1200, "B cell": 340, "NK cell": 1200},
                "panglaodb": {"Monocytes": 480}
            }
        })
    }

    #[test]
    fn test_payload_classifies_known_shapes() {
        let record = OutputRecord::from_response(
            "annotation",
            "/data/pbmc.h5ad",
            json!({
                "data": {
                    "figs": [["/out/umap.png", "UMAP"]],
                    "adata": summary_json(),
                    "timestamp": "20250506_1243",
                    "mixed": [["/out/a.png", "A"], "stray"]
                }
            }),
        )
        .unwrap();

        let payload = record.payload();
        assert_eq!(payload.len(), 4);
        assert!(matches!(payload[0].1, PayloadEntry::Artifacts(ref a) if a.len() == 1));
        assert!(matches!(payload[1].1, PayloadEntry::Summary(_)));
        assert!(matches!(payload[2].1, PayloadEntry::Other(_)));
        assert!(matches!(payload[3].1, PayloadEntry::Other(_)));
    }

    #[test]
    fn test_summary_tolerates_nulls_and_keeps_label_order() {
        let summary: SummaryDatum = serde_json::from_value(summary_json()).unwrap();
        assert!(summary.clusters.is_empty());
        let names: Vec<&str> = summary
            .label_counts
            .categories()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["cellmarker", "panglaodb"]);
        let cellmarker = summary.label_counts.get("cellmarker").unwrap();
        assert_eq!(cellmarker.labels[1], ("B cell".to_string(), 340));
    }

    #[test]
    fn test_whole_float_counts_still_a_summary() {
        let mut value = summary_json();
        value["n_obs"] = json!(2700.0);
        value["n_vars"] = json!(32738.0);
        let record = OutputRecord::from_response(
            "annotation",
            "/data/pbmc.h5ad",
            json!({ "data": { "adata": value } }),
        )
        .unwrap();
        let summary = record.summary().unwrap();
        assert_eq!(summary.cell_label(), "2700 cells");
        assert_eq!(summary.n_vars, 32738);
    }

    #[test]
    fn test_sorted_label_counts_descending_and_stable() {
        let summary: SummaryDatum = serde_json::from_value(summary_json()).unwrap();
        let sorted = summary.sorted_label_counts();
        let labels: Vec<&str> = sorted[0].labels.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["T cell", "NK cell", "B cell"]);
    }

    #[test]
    fn test_summary_labels() {
        let summary: SummaryDatum = serde_json::from_value(summary_json()).unwrap();
        assert_eq!(summary.file_name(), "pbmc.h5ad");
        assert_eq!(summary.cell_label(), "2700 cells");
        assert_eq!(summary.gene_label(), "32738 genes");
        assert_eq!(summary.state_label(), "pre-processed");
    }

    #[test]
    fn test_row_table_uses_first_row_headers() {
        let rows: Vec<Row> = vec![
            json!({"cluster": "0", "count": 812}).as_object().unwrap().clone(),
            json!({"cluster": "1"}).as_object().unwrap().clone(),
        ];
        let table = SummaryDatum::table(&rows);
        assert_eq!(table.headers, vec!["cluster", "count"]);
        assert_eq!(table.rows[0], vec!["0", "812"]);
        assert_eq!(table.rows[1], vec!["1", ""]);
    }

    #[test]
    fn test_missing_summary_and_params() {
        let record = OutputRecord::from_response("x", "/in.h5ad", json!({"data": {}})).unwrap();
        assert!(record.summary().is_none());
        assert!(record.params().is_none());
    }

    #[test]
    fn test_non_object_response_rejected() {
        let err = OutputRecord::from_response("x", "/in.h5ad", json!([1, 2])).unwrap_err();
        assert!(matches!(err, RecordError::NotAnObject));
    }

    #[test]
    fn test_file_name_handles_both_separators() {
        assert_eq!(file_name("/a/b/c.png"), "c.png");
        assert_eq!(file_name("C:\\out\\d.csv"), "d.csv");
        assert_eq!(file_name("plain"), "plain");
    }
}
