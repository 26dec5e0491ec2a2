//! Scope selection feeding a cell interaction request.

use cellpilot::jobs::{CellInteractionParams, JobRequest};
use cellpilot::record::SummaryDatum;
use cellpilot::scope::{CheckState, Preset, ScopeId, ScopeSelector};
use serde_json::json;

fn summary() -> SummaryDatum {
    serde_json::from_value(json!({
        "path": "/d/tumor.h5ad",
        "n_obs": 22,
        "n_vars": 1000,
        "label_counts": {
            "CellType": {"Tcell": 10, "Bcell": 5},
            "Tissue": {"Lung": 7}
        }
    }))
    .unwrap()
}

#[test]
fn all_then_clear_category_leaves_other_category() {
    let mut scope = ScopeSelector::for_summary(Some(&summary()));
    scope.apply_preset(Preset::All);
    assert_eq!(scope.display().to_string(), "All");
    assert_eq!(scope.preset_check(), CheckState::Checked);

    scope.toggle_whole_category("CellType");
    let ids: Vec<String> = scope.selected().iter().map(ScopeId::encode).collect();
    assert_eq!(ids, vec!["Tissue::Lung"]);
    assert_eq!(scope.display().to_string(), "1 selected");
    assert_eq!(scope.preset_check(), CheckState::Indeterminate);
    assert_eq!(scope.category_check("CellType"), CheckState::Unchecked);
    assert_eq!(scope.category_check("Tissue"), CheckState::Checked);
}

#[test]
fn selection_stays_inside_universe() {
    let mut scope = ScopeSelector::for_summary(Some(&summary()));
    scope.toggle_item(&ScopeId::new("Tissue", "Liver"));
    scope.toggle_whole_category("Batch");
    assert!(scope.selected().is_empty());

    let universe = scope.universe();
    scope.apply_preset(Preset::All);
    assert!(scope.selected().iter().all(|id| universe.contains(id)));
    assert_eq!(universe.len(), 3);
}

#[test]
fn decoded_labels_become_plot_column_names() {
    let mut scope = ScopeSelector::for_summary(Some(&summary()));
    scope.toggle_item(&ScopeId::new("CellType", "Bcell"));
    scope.toggle_item(&ScopeId::new("CellType", "Tcell"));

    let params = CellInteractionParams::new("/d/tumor.h5ad").with_scope(&scope);
    let body = JobRequest::CellInteraction(params).body();
    assert_eq!(body["plot_column_names"], json!(["Bcell", "Tcell"]));
    assert_eq!(body["cpdb_file_path"], "db/cellphonedb.zip");
}
