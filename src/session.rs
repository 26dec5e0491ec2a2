//! Application session: uploaded datasets, the append-only output history and
//! which of them is on screen.

use std::path::PathBuf;

use crate::backend::{ContentService, JobService, SubmitError};
use crate::config::ClientConfig;
use crate::jobs::{JobRequest, JobSubmitter};
use crate::logging::{log, obj, v_bool, v_num, v_str, Domain, Level};
use crate::preview::{FetchOutcome, FetchTicket};
use crate::record::{file_name, OutputRecord, SummaryDatum};
use crate::scope::ScopeSelector;
use crate::view::ResultView;

/// Native file dialogs. `None` means the user cancelled.
pub trait Picker {
    fn pick_file(&self) -> Option<PathBuf>;
    fn pick_dir(&self) -> Option<PathBuf>;
}

pub type UploadId = usize;
pub type OutputId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub id: UploadId,
    pub name: String,
    pub summary: SummaryDatum,
    /// Outputs produced from this dataset, oldest first
    pub outputs: Vec<OutputId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Cancelled,
    /// A dataset with the same file name was already uploaded
    Reused(UploadId),
    Uploaded(UploadId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Input,
    Output,
}

pub struct Session {
    uploads: Vec<Upload>,
    outputs: Vec<OutputRecord>,
    next_upload: UploadId,
    active_upload: Option<UploadId>,
    active_output: Option<OutputId>,
    mode: ViewMode,
    scope: ScopeSelector,
    view: ResultView,
}

impl Session {
    pub fn new(cfg: &ClientConfig) -> Self {
        Self {
            uploads: Vec::new(),
            outputs: Vec::new(),
            next_upload: 0,
            active_upload: None,
            active_output: None,
            mode: ViewMode::Input,
            scope: ScopeSelector::new(),
            view: ResultView::new(cfg.max_preview_rows),
        }
    }

    /// Newest first.
    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    pub fn upload(&self, id: UploadId) -> Option<&Upload> {
        self.uploads.iter().find(|u| u.id == id)
    }

    pub fn outputs(&self) -> &[OutputRecord] {
        &self.outputs
    }

    pub fn active_upload(&self) -> Option<&Upload> {
        self.active_upload.and_then(|id| self.upload(id))
    }

    pub fn active_summary(&self) -> Option<&SummaryDatum> {
        self.active_upload().map(|u| &u.summary)
    }

    pub fn active_output(&self) -> Option<OutputId> {
        self.active_output
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn scope(&self) -> &ScopeSelector {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut ScopeSelector {
        &mut self.scope
    }

    pub fn view(&self) -> &ResultView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ResultView {
        &mut self.view
    }

    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        self.view.apply(outcome)
    }

    /// Pick a dataset and register it. Nothing changes on cancel or failure.
    pub async fn upload_from_picker(
        &mut self,
        picker: &dyn Picker,
        service: &dyn JobService,
    ) -> Result<UploadOutcome, SubmitError> {
        let Some(path) = picker.pick_file() else {
            return Ok(UploadOutcome::Cancelled);
        };
        let input_path = path.to_string_lossy().into_owned();
        let name = file_name(&input_path).to_string();

        if let Some(id) = self.uploads.iter().find(|u| u.name == name).map(|u| u.id) {
            log(
                Level::Info,
                Domain::Session,
                "upload_reused",
                obj(&[("name", v_str(&name)), ("upload", v_num(id as f64))]),
            );
            self.show_input(id);
            return Ok(UploadOutcome::Reused(id));
        }

        let summary = service.upload(&input_path, &name).await?;
        let id = self.next_upload;
        self.next_upload += 1;
        log(
            Level::Info,
            Domain::Session,
            "uploaded",
            obj(&[
                ("name", v_str(&name)),
                ("upload", v_num(id as f64)),
                ("preprocessed", v_bool(summary.preprocessed)),
            ]),
        );
        self.uploads.insert(
            0,
            Upload {
                id,
                name,
                summary,
                outputs: Vec::new(),
            },
        );
        self.show_input(id);
        Ok(UploadOutcome::Uploaded(id))
    }

    /// Switch to the input view of an upload. Unknown ids are ignored.
    pub fn show_input(&mut self, id: UploadId) -> bool {
        if self.upload(id).is_none() {
            return false;
        }
        self.activate_upload(Some(id));
        self.active_output = None;
        self.mode = ViewMode::Input;
        true
    }

    /// Switch to an output record; its owning upload becomes active.
    pub fn show_output(
        &mut self,
        id: OutputId,
        content: &dyn ContentService,
    ) -> Option<FetchTicket> {
        let record = self.outputs.get(id)?.clone();
        let owner = self.owner_of(&record.input);
        if owner.is_some() {
            self.activate_upload(owner);
        }
        self.active_output = Some(id);
        self.mode = ViewMode::Output;
        self.view.load(record, content)
    }

    /// Append a finished job's record and switch to it.
    pub fn record_output(
        &mut self,
        record: OutputRecord,
        content: &dyn ContentService,
    ) -> (OutputId, Option<FetchTicket>) {
        let id = self.outputs.len();
        if let Some(owner) = self.owner_of(&record.input) {
            if let Some(upload) = self.uploads.iter_mut().find(|u| u.id == owner) {
                upload.outputs.push(id);
            }
        }
        self.outputs.push(record);
        let ticket = self.show_output(id, content);
        (id, ticket)
    }

    /// Submit a job and, on success, record and show its output.
    pub async fn run_job(
        &mut self,
        submitter: &JobSubmitter,
        jobs: &dyn JobService,
        content: &dyn ContentService,
        request: JobRequest,
    ) -> Result<(OutputId, Option<FetchTicket>), SubmitError> {
        let record = submitter.submit(jobs, request).await?;
        Ok(self.record_output(record, content))
    }

    /// Directory for a form's output field; `None` on cancel.
    pub fn pick_output_dir(&self, picker: &dyn Picker) -> Option<String> {
        picker
            .pick_dir()
            .map(|dir| dir.to_string_lossy().into_owned())
    }

    fn owner_of(&self, input_path: &str) -> Option<UploadId> {
        self.uploads
            .iter()
            .find(|u| u.summary.path == input_path)
            .map(|u| u.id)
    }

    fn activate_upload(&mut self, id: Option<UploadId>) {
        self.active_upload = id;
        let summary = self.active_upload.and_then(|id| {
            self.uploads
                .iter()
                .find(|u| u.id == id)
                .map(|u| u.summary.clone())
        });
        self.scope.rebind(summary.as_ref());
    }
}
