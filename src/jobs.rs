//! Analysis job requests and their submission.
//!
//! Each job kind has a typed parameter set serialized as the backend's request
//! body. [`JobSubmitter`] runs one request at a time and turns the response
//! into a new [`OutputRecord`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::{JobService, SubmitError};
use crate::logging::{log_job, ts_epoch_ms};
use crate::record::{OutputRecord, SummaryDatum};
use crate::scope::ScopeSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Annotation,
    CellInteraction,
    TumorPrediction,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Annotation => "annotation",
            JobKind::CellInteraction => "cell_interaction",
            JobKind::TumorPrediction => "tumor_prediction",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            JobKind::Annotation => "annotate",
            JobKind::CellInteraction => "cellphonedb",
            JobKind::TumorPrediction => "inferCNV",
        }
    }

    /// Shown when the backend gives no detail of its own.
    pub fn failure_message(&self) -> &'static str {
        match self {
            JobKind::Annotation => "Annotation failed",
            JobKind::CellInteraction => "CellPhoneDB failed",
            JobKind::TumorPrediction => "Tumor Prediction failed",
        }
    }

    fn name_prefix(&self) -> &'static str {
        match self {
            JobKind::CellInteraction => "cpdb",
            _ => "run",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingParams {
    pub mito_prefix: String,
    pub mito_threshold: f64,
    pub min_genes: u32,
    pub min_counts: u32,
    pub n_hvgs: u32,
    pub n_pcs: u32,
    pub n_neighbors: u32,
    pub resolution: f64,
}

impl Default for PreprocessingParams {
    fn default() -> Self {
        Self {
            mito_prefix: "MT-".to_string(),
            mito_threshold: 0.05,
            min_genes: 250,
            min_counts: 500,
            n_hvgs: 2000,
            n_pcs: 50,
            n_neighbors: 15,
            resolution: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationParams {
    pub name: String,
    pub input_path: String,
    pub output_dir: String,
    pub preprocessed: bool,
    pub preprocessing_params: PreprocessingParams,
    pub use_cellmarker: bool,
    pub use_panglao: bool,
    pub use_cancer_single_cell_atlas: bool,
}

impl AnnotationParams {
    pub fn new(input_path: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            input_path: input_path.into(),
            output_dir: String::new(),
            preprocessed: false,
            preprocessing_params: PreprocessingParams::default(),
            use_cellmarker: true,
            use_panglao: false,
            use_cancer_single_cell_atlas: false,
        }
    }

    /// Preprocessing is skipped for datasets the backend reports as already processed.
    pub fn for_summary(summary: &SummaryDatum) -> Self {
        Self {
            preprocessed: summary.preprocessed,
            ..Self::new(summary.path.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInteractionParams {
    pub input_path: String,
    pub name: String,
    pub output_dir: String,
    pub column_name: String,
    pub cpdb_file_path: String,
    pub plot_column_names: Vec<String>,
    pub counts_threshold: u32,
}

impl CellInteractionParams {
    pub fn new(input_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            name: String::new(),
            output_dir: String::new(),
            column_name: "cell_type".to_string(),
            cpdb_file_path: "db/cellphonedb.zip".to_string(),
            plot_column_names: Vec::new(),
            counts_threshold: 10,
        }
    }

    /// Plot only the labels currently picked in the scope selector.
    pub fn with_scope(mut self, scope: &ScopeSelector) -> Self {
        self.plot_column_names = scope.decoded_labels();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TumorPredictionParams {
    pub input_path: String,
    pub name: String,
    pub output_dir: String,
    pub reference_key: String,
    pub reference_cat: Vec<String>,
    pub gtf_path: String,
    pub cnv_threshold: f64,
    pub cores: u32,
}

impl TumorPredictionParams {
    pub fn new(input_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            name: String::new(),
            output_dir: String::new(),
            reference_key: String::new(),
            reference_cat: Vec::new(),
            gtf_path: "db/gencode.v47.annotation.gtf.gz".to_string(),
            cnv_threshold: 0.03,
            cores: 4,
        }
    }

    /// A new key invalidates the categories picked under the old one.
    pub fn set_reference_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        if key != self.reference_key {
            self.reference_key = key;
            self.reference_cat.clear();
        }
    }

    /// Labels available as reference categories under the current key.
    pub fn reference_options(&self, summary: &SummaryDatum) -> Vec<String> {
        summary
            .label_counts
            .get(&self.reference_key)
            .map(|c| c.labels.iter().map(|(label, _)| label.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    Annotation(AnnotationParams),
    CellInteraction(CellInteractionParams),
    TumorPrediction(TumorPredictionParams),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Annotation(_) => JobKind::Annotation,
            JobRequest::CellInteraction(_) => JobKind::CellInteraction,
            JobRequest::TumorPrediction(_) => JobKind::TumorPrediction,
        }
    }

    pub fn input_path(&self) -> &str {
        match self {
            JobRequest::Annotation(p) => &p.input_path,
            JobRequest::CellInteraction(p) => &p.input_path,
            JobRequest::TumorPrediction(p) => &p.input_path,
        }
    }

    fn fields_mut(&mut self) -> (&mut String, &mut String) {
        match self {
            JobRequest::Annotation(p) => (&mut p.name, &mut p.output_dir),
            JobRequest::CellInteraction(p) => (&mut p.name, &mut p.output_dir),
            JobRequest::TumorPrediction(p) => (&mut p.name, &mut p.output_dir),
        }
    }

    /// Fill blank `name` and `output_dir`; returns the effective name.
    pub fn fill_defaults(&mut self, now_ms: u64, cwd: &std::path::Path) -> String {
        let prefix = self.kind().name_prefix();
        let (name, output_dir) = self.fields_mut();
        if name.trim().is_empty() {
            *name = format!("{}_{}", prefix, now_ms);
        }
        if output_dir.trim().is_empty() {
            *output_dir = cwd.join("output").to_string_lossy().into_owned();
        }
        name.clone()
    }

    pub fn body(&self) -> Value {
        let body = match self {
            JobRequest::Annotation(p) => serde_json::to_value(p),
            JobRequest::CellInteraction(p) => serde_json::to_value(p),
            JobRequest::TumorPrediction(p) => serde_json::to_value(p),
        };
        body.unwrap_or(Value::Null)
    }
}

/// Tracks job submissions on behalf of the forms. Clones share the running
/// flag, so a form can hold one while another drives the submission.
#[derive(Debug, Clone, Default)]
pub struct JobSubmitter {
    running: Arc<AtomicBool>,
}

/// Clears the running flag when the submission finishes or is abandoned.
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn start(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl JobSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a submission is in flight; forms disable their run button.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn submit(
        &self,
        service: &dyn JobService,
        mut request: JobRequest,
    ) -> Result<OutputRecord, SubmitError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let name = request.fill_defaults(ts_epoch_ms(), &cwd);
        let kind = request.kind();

        let guard = RunningGuard::start(&self.running);
        log_job("submitted", kind.as_str(), &name, None);
        let result = service.submit(kind, request.body()).await;
        drop(guard);

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                log_job("failed", kind.as_str(), &name, Some(&err.detail()));
                return Err(err);
            }
        };
        let record = OutputRecord::from_response(name.clone(), request.input_path(), response)
            .map_err(|e| SubmitError::Decode(e.to_string()))?;
        log_job("completed", kind.as_str(), &name, None);
        Ok(record)
    }
}
