//! Result view end to end: saved record on disk → catalog → default selection
//! → preview loads, including late arrivals for abandoned selections.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cellpilot::backend::{ContentService, FetchError};
use cellpilot::preview::{PreviewContent, PreviewStrategy, TextKind, FAILED_TO_LOAD};
use cellpilot::record::OutputRecord;
use cellpilot::selection::Selection;
use cellpilot::view::ResultView;
use serde_json::json;

/// Serves text from memory after a per-path delay.
#[derive(Default)]
struct SlowContent {
    texts: HashMap<String, (String, u64)>,
}

impl SlowContent {
    fn with(mut self, path: &str, text: &str, delay_ms: u64) -> Self {
        self.texts.insert(path.to_string(), (text.to_string(), delay_ms));
        self
    }
}

#[async_trait]
impl ContentService for SlowContent {
    async fn fetch_text(&self, path: &str, _kind: TextKind) -> Result<String, FetchError> {
        let (text, delay) = self.texts.get(path).cloned().ok_or(FetchError::Status(404))?;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(text)
    }

    fn image_locator(&self, path: &str) -> String {
        format!("http://backend/preview_img?path={}", path)
    }
}

fn record() -> OutputRecord {
    OutputRecord::from_response(
        "cpdb_1",
        "/d/a.h5ad",
        json!({
            "name": "cpdb_1",
            "type": "cellphonedb",
            "timestamp": "20250101_1200",
            "data": {
                "figs": [["/o/dot.png", "Dot Plots"]],
                "files": [["/o/a.csv", "Results"], ["/o/b.txt", "Logs"], ["/o/dot.png", "Dot Plots"]],
                "timestamp": "20250101_1200"
            }
        }),
    )
    .unwrap()
}

#[test]
fn loads_saved_record_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let saved = json!({
        "name": "run_7",
        "input": "/d/a.h5ad",
        "data": {
            "data": {
                "adata": {"path": "/o/run_7.h5ad", "n_obs": 100, "n_vars": 2000, "preprocessed": true},
                "figs": [["/o/umap.png", "UMAP"]]
            },
            "params": {"resolution": 0.8}
        }
    });
    write!(file, "{}", saved).unwrap();

    let record = OutputRecord::from_path(file.path()).unwrap();
    assert_eq!(record.name, "run_7");
    assert_eq!(record.summary().unwrap().cell_label(), "100 cells");

    let mut view = ResultView::new(20);
    let service = SlowContent::default();
    assert!(view.load(record, &service).is_none());
    assert_eq!(view.selection(), &Selection::Summary);
    assert_eq!(view.rail()[0].label, "run_7.h5ad");
}

#[test]
fn malformed_record_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"name\": 3").unwrap();
    assert!(OutputRecord::from_path(file.path()).is_err());
}

#[tokio::test]
async fn late_fetch_for_abandoned_selection_is_discarded() {
    let service = Arc::new(
        SlowContent::default()
            .with("/o/a.csv", "gene,score\nCD3E,4.2\n", 80)
            .with("/o/b.txt", "done", 5),
    );
    let mut view = ResultView::new(20);
    view.load(record(), service.as_ref());
    assert_eq!(view.selection().path(), Some("/o/dot.png"));

    let slow = view
        .select(Selection::Artifact("/o/a.csv".into()), service.as_ref())
        .unwrap();
    let fast = view
        .select(Selection::Artifact("/o/b.txt".into()), service.as_ref())
        .unwrap();

    let slow_task = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { slow.run(service.as_ref()).await })
    };
    let fast_task = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { fast.run(service.as_ref()).await })
    };

    let fast_outcome = fast_task.await.unwrap();
    assert!(view.apply(fast_outcome));
    let slow_outcome = slow_task.await.unwrap();
    assert!(!view.apply(slow_outcome));

    assert_eq!(
        view.preview().content(),
        &PreviewContent::Text {
            path: "/o/b.txt".into(),
            text: "done".into()
        }
    );
}

#[tokio::test]
async fn csv_preview_is_capped_and_failures_show_sentinel() {
    let mut text = String::from("gene,score\n");
    for i in 0..50 {
        text.push_str(&format!("G{},{}\n", i, i));
    }
    let service = SlowContent::default().with("/o/a.csv", &text, 0);
    let mut view = ResultView::new(5);
    view.load(record(), &service);

    let ticket = view
        .select(Selection::Artifact("/o/a.csv".into()), &service)
        .unwrap();
    assert!(view.apply(ticket.run(&service).await));
    match view.preview().content() {
        PreviewContent::Table { table, .. } => {
            assert_eq!(table.headers, vec!["gene", "score"]);
            assert_eq!(table.rows.len(), 4);
        }
        other => panic!("unexpected content {:?}", other),
    }

    let ticket = view
        .select(Selection::Artifact("/o/b.txt".into()), &service)
        .unwrap();
    let outcome = ticket.run(&service).await;
    assert!(outcome.failed);
    assert!(view.apply(outcome));
    assert!(matches!(view.preview().content(), PreviewContent::Text { text, .. } if text == FAILED_TO_LOAD));
}

#[test]
fn record_switch_resets_even_with_same_default() {
    let service = SlowContent::default();
    let mut view = ResultView::new(20);
    view.load(record(), &service);
    view.overlay_mut().zoom_in();
    assert!(view.overlay().zoom_controls_visible(view.preview().strategy()));
    let before = view.preview().generation();

    view.load(record(), &service);
    assert_eq!(view.selection().path(), Some("/o/dot.png"));
    assert_eq!(view.preview().strategy(), Some(PreviewStrategy::Image));
    assert_eq!(view.overlay().zoom(), 1.0);
    assert!(view.preview().generation() > before);
}
