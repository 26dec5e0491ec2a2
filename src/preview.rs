//! Preview dispatch: picks a strategy for the current selection and owns the
//! content shown for it.
//!
//! Text content is loaded through [`FetchTicket`]s. Every dispatch bumps a
//! generation counter; an outcome is applied only if its generation and key
//! still match the live request, so a slow fetch for an abandoned selection
//! can never overwrite the preview of the current one.

use crate::backend::ContentService;
use crate::logging::{log_fetch_discarded, log_fetch_failed};
use crate::record::{file_name, SummaryDatum};
use crate::selection::Selection;

pub const FAILED_TO_LOAD: &str = "Failed to load file";

const IMAGE_SUFFIXES: &[&str] = &["png", "jpg", "jpeg", "gif", "svg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewStrategy {
    Summary,
    Image,
    Tabular,
    PlainText,
    Unsupported,
}

impl PreviewStrategy {
    /// Suffix match, case-insensitive.
    pub fn for_path(path: &str) -> Self {
        let ext = file_name(path)
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if IMAGE_SUFFIXES.contains(&ext.as_str()) {
            PreviewStrategy::Image
        } else if ext == "csv" {
            PreviewStrategy::Tabular
        } else if ext == "txt" {
            PreviewStrategy::PlainText
        } else {
            PreviewStrategy::Unsupported
        }
    }

    pub fn for_selection(selection: &Selection) -> Option<Self> {
        match selection {
            Selection::Unselected => None,
            Selection::Summary => Some(PreviewStrategy::Summary),
            Selection::Artifact(path) => Some(Self::for_path(path)),
        }
    }

    pub fn text_kind(self) -> Option<TextKind> {
        match self {
            PreviewStrategy::Tabular => Some(TextKind::Csv),
            PreviewStrategy::PlainText => Some(TextKind::Txt),
            _ => None,
        }
    }

    pub fn is_text(self) -> bool {
        self.text_kind().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKind {
    Csv,
    Txt,
}

impl TextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextKind::Csv => "csv",
            TextKind::Txt => "txt",
        }
    }

    /// Backend route serving this kind of content.
    pub fn endpoint(&self) -> &'static str {
        match self {
            TextKind::Csv => "preview_csv",
            TextKind::Txt => "preview_txt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub path: String,
    pub kind: TextKind,
}

/// A pending text load, tagged with the dispatch generation that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub key: FetchKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub generation: u64,
    pub key: FetchKey,
    pub text: String,
    pub failed: bool,
}

impl FetchTicket {
    /// Never fails: transport or backend errors become [`FAILED_TO_LOAD`].
    pub async fn run<S>(self, service: &S) -> FetchOutcome
    where
        S: ContentService + ?Sized,
    {
        let (text, failed) = match service.fetch_text(&self.key.path, self.key.kind).await {
            Ok(text) => (text, false),
            Err(err) => {
                log_fetch_failed(&self.key.path, self.key.kind.as_str(), &err.to_string());
                (FAILED_TO_LOAD.to_string(), true)
            }
        };
        FetchOutcome {
            generation: self.generation,
            key: self.key,
            text,
            failed,
        }
    }
}

/// Crude CSV preview: first `max_rows` lines, split on commas. Quoted fields
/// are not understood.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TablePreview {
    pub fn parse(text: &str, max_rows: usize) -> Self {
        let mut lines = text
            .lines()
            .take(max_rows)
            .map(|line| line.split(',').map(str::to_string).collect::<Vec<_>>());
        let headers = lines.next().unwrap_or_default();
        Self {
            headers,
            rows: lines.collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewContent {
    /// Nothing selected
    Empty,
    Summary(Box<SummaryDatum>),
    /// Locator handed to the renderer; the core never reads image bytes
    Image { path: String, locator: String },
    Loading(FetchKey),
    Table { path: String, table: TablePreview },
    Text { path: String, text: String },
    Unsupported { path: String },
}

impl PreviewContent {
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            PreviewContent::Empty => Some("Select a file"),
            PreviewContent::Loading(_) => Some("Loading…"),
            PreviewContent::Unsupported { .. } => Some("No preview available"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreviewDispatcher {
    generation: u64,
    pending: Option<FetchKey>,
    strategy: Option<PreviewStrategy>,
    content: PreviewContent,
    max_preview_rows: usize,
}

impl PreviewDispatcher {
    pub fn new(max_preview_rows: usize) -> Self {
        Self {
            generation: 0,
            pending: None,
            strategy: None,
            content: PreviewContent::Empty,
            max_preview_rows: max_preview_rows.max(1),
        }
    }

    pub fn content(&self) -> &PreviewContent {
        &self.content
    }

    pub fn strategy(&self) -> Option<PreviewStrategy> {
        self.strategy
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Route a selection to its strategy. Text strategies return a ticket the
    /// caller must run and feed back through [`PreviewDispatcher::apply`].
    pub fn dispatch(
        &mut self,
        selection: &Selection,
        summary: Option<&SummaryDatum>,
        service: &dyn ContentService,
    ) -> Option<FetchTicket> {
        self.generation += 1;
        self.pending = None;
        self.strategy = PreviewStrategy::for_selection(selection);

        let path = selection.path().unwrap_or_default().to_string();
        let strategy = self.strategy;
        self.content = match strategy {
            None => PreviewContent::Empty,
            Some(PreviewStrategy::Summary) => match summary {
                Some(summary) => PreviewContent::Summary(Box::new(summary.clone())),
                None => PreviewContent::Empty,
            },
            Some(PreviewStrategy::Image) => PreviewContent::Image {
                locator: service.image_locator(&path),
                path,
            },
            Some(PreviewStrategy::Unsupported) => PreviewContent::Unsupported { path },
            Some(PreviewStrategy::Tabular) => self.start_fetch(path, TextKind::Csv),
            Some(PreviewStrategy::PlainText) => self.start_fetch(path, TextKind::Txt),
        };

        self.pending.clone().map(|key| FetchTicket {
            generation: self.generation,
            key,
        })
    }

    fn start_fetch(&mut self, path: String, kind: TextKind) -> PreviewContent {
        let key = FetchKey { path, kind };
        self.pending = Some(key.clone());
        PreviewContent::Loading(key)
    }

    /// Apply a finished fetch. Returns false when the outcome is stale.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.generation != self.generation || self.pending.as_ref() != Some(&outcome.key) {
            log_fetch_discarded(&outcome.key.path, outcome.generation, self.generation);
            return false;
        }
        self.pending = None;
        let FetchOutcome { key, text, .. } = outcome;
        self.content = match key.kind {
            TextKind::Csv => PreviewContent::Table {
                table: TablePreview::parse(&text, self.max_preview_rows),
                path: key.path,
            },
            TextKind::Txt => PreviewContent::Text {
                path: key.path,
                text,
            },
        };
        true
    }
}
