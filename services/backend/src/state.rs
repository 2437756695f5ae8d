use std::sync::Arc;

use crate::controllers::extractor::{Extractor, build_extractor};
use crate::models::download::FileSizeLimits;
use crate::settings::Settings;

/// Shared read-only across requests; controllers borrow from it.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn Extractor>,
    pub limits: FileSizeLimits,
}

impl AppState {
    pub fn new(extractor: Arc<dyn Extractor>, limits: FileSizeLimits) -> Self {
        Self { extractor, limits }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(build_extractor(settings), settings.limits)
    }
}
