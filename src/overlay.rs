use serde_json::{Map, Value};

use crate::preview::PreviewStrategy;
use crate::record::OutputRecord;

/// Zoom in quarter steps: 1 = 0.25x, 4 = 1x, 16 = 4x.
const MIN_QUARTERS: u8 = 1;
const MAX_QUARTERS: u8 = 16;
const UNIT_QUARTERS: u8 = 4;

/// Image zoom plus the parameters panel toggle for one result view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    quarters: u8,
    params_open: bool,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            quarters: UNIT_QUARTERS,
            params_open: false,
        }
    }
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom(&self) -> f64 {
        f64::from(self.quarters) / f64::from(UNIT_QUARTERS)
    }

    pub fn zoom_in(&mut self) {
        self.quarters = (self.quarters + 1).min(MAX_QUARTERS);
    }

    pub fn zoom_out(&mut self) {
        self.quarters = self.quarters.saturating_sub(1).max(MIN_QUARTERS);
    }

    pub fn zoom_controls_visible(&self, strategy: Option<PreviewStrategy>) -> bool {
        strategy == Some(PreviewStrategy::Image)
    }

    pub fn params_open(&self) -> bool {
        self.params_open
    }

    pub fn toggle_params(&mut self) {
        self.params_open = !self.params_open;
    }

    /// Parameters to show: the panel is open, something other than a text
    /// preview is on screen and the record carries a parameter map.
    pub fn params_panel<'a>(
        &self,
        strategy: Option<PreviewStrategy>,
        record: &'a OutputRecord,
    ) -> Option<&'a Map<String, Value>> {
        if !self.params_open || !shows_params(strategy) {
            return None;
        }
        record.params()
    }

    /// Whether the toggle button is offered at all.
    pub fn params_available(
        &self,
        strategy: Option<PreviewStrategy>,
        record: &OutputRecord,
    ) -> bool {
        shows_params(strategy) && record.params().is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn shows_params(strategy: Option<PreviewStrategy>) -> bool {
    strategy.map_or(false, |s| !s.is_text())
}
