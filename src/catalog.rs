use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::Sender;
use tracing::{info, warn};

use crate::data::CatalogService;
use crate::event::AsyncResponse;
use crate::filter::{self, FilterState};
use crate::flight::{self, Flight};
use crate::models::Video;

pub const FETCH_ERROR: &str = "Failed to fetch videos";

/// Home page state: the catalog is fetched once per mount and filtered locally.
#[derive(Default)]
pub struct CatalogView {
    videos: Vec<Video>,
    visible: Vec<Video>,
    filter: FilterState,
    loaded: bool,
    error: Option<String>,
    flight: Flight,
}

impl CatalogView {
    pub fn new(filter: FilterState) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    pub fn visible(&self) -> &[Video] {
        &self.visible
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.flight.in_flight()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Starts the catalog fetch. Returns false when one is already outstanding.
    pub fn fetch(
        &mut self,
        service: &Arc<dyn CatalogService>,
        tx: &Sender<AsyncResponse>,
    ) -> bool {
        let Some(ticket) = self.flight.begin() else {
            return false;
        };
        self.error = None;
        let service = service.clone();
        flight::spawn(
            ticket,
            tx,
            move || service.list_videos(),
            |request_id, result| AsyncResponse::Catalog { request_id, result },
        );
        true
    }

    /// Same guarded fetch, offered after a failure.
    pub fn retry(
        &mut self,
        service: &Arc<dyn CatalogService>,
        tx: &Sender<AsyncResponse>,
    ) -> bool {
        self.fetch(service, tx)
    }

    /// Applies a fetch result. Stale or cancelled responses are ignored and return false.
    pub fn apply(&mut self, request_id: u64, result: Result<Vec<Video>>) -> bool {
        if !self.flight.settle(request_id) {
            return false;
        }
        match result {
            Ok(videos) => {
                info!(count = videos.len(), "catalog loaded");
                self.videos = videos;
                self.loaded = true;
                self.error = None;
                self.refilter();
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "catalog fetch failed");
                self.error = Some(FETCH_ERROR.to_string());
            }
        }
        true
    }

    /// Filter changes never trigger a fetch.
    pub fn set_filter(&mut self, filter: FilterState) {
        if self.filter == filter {
            return;
        }
        self.filter = filter;
        self.refilter();
    }

    pub fn cancel(&mut self) {
        self.flight.cancel();
    }

    fn refilter(&mut self) {
        self.visible = filter::filter(&self.videos, &self.filter);
    }
}
