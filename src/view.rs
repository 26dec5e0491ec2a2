//! One output record on screen: catalog, selection, preview and overlay wired
//! together so that a record switch resets all of them at once.

use crate::backend::ContentService;
use crate::catalog::Catalog;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::overlay::Overlay;
use crate::preview::{FetchOutcome, FetchTicket, PreviewDispatcher, PreviewStrategy};
use crate::record::{file_name, OutputRecord, SummaryDatum};
use crate::selection::{Selection, SelectionModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RailGroup {
    Summary,
    Images,
    Files,
    Other,
}

impl RailGroup {
    pub fn title(&self) -> &'static str {
        match self {
            RailGroup::Summary => "Summary",
            RailGroup::Images => "Images",
            RailGroup::Files => "Files",
            RailGroup::Other => "Other",
        }
    }

    fn for_strategy(strategy: PreviewStrategy) -> Self {
        match strategy {
            PreviewStrategy::Summary => RailGroup::Summary,
            PreviewStrategy::Image => RailGroup::Images,
            PreviewStrategy::Tabular | PreviewStrategy::PlainText => RailGroup::Files,
            PreviewStrategy::Unsupported => RailGroup::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RailItem {
    pub label: String,
    pub category: Option<String>,
    pub target: Selection,
    pub strategy: PreviewStrategy,
    pub group: RailGroup,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct ResultView {
    record: Option<OutputRecord>,
    catalog: Catalog,
    summary: Option<SummaryDatum>,
    selection: SelectionModel,
    preview: PreviewDispatcher,
    overlay: Overlay,
}

impl ResultView {
    pub fn new(max_preview_rows: usize) -> Self {
        Self {
            record: None,
            catalog: Catalog::default(),
            summary: None,
            selection: SelectionModel::new(),
            preview: PreviewDispatcher::new(max_preview_rows),
            overlay: Overlay::new(),
        }
    }

    /// Show `record`, discarding all per-record state first. Runs even when
    /// the record is the one already shown.
    pub fn load(
        &mut self,
        record: OutputRecord,
        service: &dyn ContentService,
    ) -> Option<FetchTicket> {
        self.catalog = Catalog::from_record(&record);
        self.summary = record.summary();
        self.overlay.reset();
        self.selection
            .reset(&record.name, &self.catalog, self.summary.is_some());
        log(
            Level::Info,
            Domain::Session,
            "record_loaded",
            obj(&[
                ("record", v_str(&record.name)),
                ("digest", v_str(&record.digest())),
                ("artifacts", v_num(self.catalog.len() as f64)),
            ]),
        );
        self.record = Some(record);
        self.dispatch(service)
    }

    /// Change the selection; an unchanged or invalid target issues nothing.
    pub fn select(
        &mut self,
        target: Selection,
        service: &dyn ContentService,
    ) -> Option<FetchTicket> {
        if self.record.is_none() {
            return None;
        }
        if !self
            .selection
            .select(target, &self.catalog, self.summary.is_some())
        {
            return None;
        }
        self.dispatch(service)
    }

    /// Re-issue the current selection, e.g. after a failed text load.
    pub fn refresh(&mut self, service: &dyn ContentService) -> Option<FetchTicket> {
        self.record.as_ref()?;
        self.dispatch(service)
    }

    fn dispatch(&mut self, service: &dyn ContentService) -> Option<FetchTicket> {
        self.preview
            .dispatch(self.selection.current(), self.summary.as_ref(), service)
    }

    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        self.preview.apply(outcome)
    }

    pub fn record(&self) -> Option<&OutputRecord> {
        self.record.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn summary(&self) -> Option<&SummaryDatum> {
        self.summary.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        self.selection.current()
    }

    pub fn preview(&self) -> &PreviewDispatcher {
        &self.preview
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    pub fn title(&self) -> String {
        match &self.record {
            Some(record) => format!("{} Results", record.name),
            None => "Results".to_string(),
        }
    }

    /// Left-rail listing: summary, then images, then text files, then anything
    /// without a preview. Catalog order is kept within each group.
    pub fn rail(&self) -> Vec<RailItem> {
        let current = self.selection.current();
        let mut items = Vec::with_capacity(self.catalog.len() + 1);
        if let Some(summary) = &self.summary {
            items.push(RailItem {
                label: summary.file_name().to_string(),
                category: None,
                target: Selection::Summary,
                strategy: PreviewStrategy::Summary,
                group: RailGroup::Summary,
                selected: *current == Selection::Summary,
            });
        }
        let mut artifacts: Vec<RailItem> = self
            .catalog
            .entries()
            .iter()
            .map(|artifact| {
                let strategy = PreviewStrategy::for_path(&artifact.path);
                let target = Selection::Artifact(artifact.path.clone());
                RailItem {
                    label: file_name(&artifact.path).to_string(),
                    category: Some(artifact.category.clone()),
                    selected: *current == target,
                    target,
                    strategy,
                    group: RailGroup::for_strategy(strategy),
                }
            })
            .collect();
        artifacts.sort_by_key(|item| item.group);
        items.extend(artifacts);
        items
    }
}
