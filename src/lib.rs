//! Core of a single-cell analysis desktop client: classifies job output
//! records into previewable artifacts, tracks the active selection, loads
//! previews from the analysis backend and scopes follow-up jobs to picked
//! cell labels.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod overlay;
pub mod preview;
pub mod record;
pub mod retry;
pub mod scope;
pub mod selection;
pub mod session;
pub mod view;

pub use backend::{ContentService, FetchError, HttpBackend, JobService, SubmitError};
pub use catalog::{ArtifactRef, Catalog};
pub use config::ClientConfig;
pub use preview::{FetchOutcome, FetchTicket, PreviewContent, PreviewDispatcher, PreviewStrategy};
pub use record::{OutputRecord, SummaryDatum};
pub use scope::{ScopeId, ScopeSelector};
pub use selection::{Selection, SelectionModel};
pub use session::Session;
pub use view::ResultView;
