use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::Sender;
use tracing::{info, warn};

use crate::api;
use crate::comments::CommentThread;
use crate::data::{CatalogService, CommentService};
use crate::event::AsyncResponse;
use crate::filter;
use crate::flight::{self, Flight};
use crate::models::Video;

pub const NOT_FOUND: &str = "Video not found";

/// Local-only like/dislike state. Never sent to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reaction {
    #[default]
    None,
    Liked,
    Disliked,
}

impl Reaction {
    pub fn toggle_like(self) -> Self {
        match self {
            Reaction::Liked => Reaction::None,
            _ => Reaction::Liked,
        }
    }

    pub fn toggle_dislike(self) -> Self {
        match self {
            Reaction::Disliked => Reaction::None,
            _ => Reaction::Disliked,
        }
    }
}

#[derive(Default)]
pub struct DetailView {
    video_id: Option<String>,
    video: Option<Video>,
    related: Vec<Video>,
    error: Option<String>,
    reaction: Reaction,
    subscribed: bool,
    video_flight: Flight,
    related_flight: Flight,
    thread: CommentThread,
}

impl DetailView {
    /// Switches to `video_id`. All state from the previous video is cleared
    /// before any request for the new one is issued.
    pub fn open(
        &mut self,
        video_id: &str,
        catalog: &Arc<dyn CatalogService>,
        comments: &Arc<dyn CommentService>,
        tx: &Sender<AsyncResponse>,
    ) {
        self.reset(video_id);
        info!(video_id, "opening video");
        self.fetch_video(catalog, tx);
        self.fetch_related(catalog, tx);
        self.thread.fetch(comments, tx);
    }

    pub fn reset(&mut self, video_id: &str) {
        self.video_flight.cancel();
        self.related_flight.cancel();
        self.video_id = Some(video_id.to_string());
        self.video = None;
        self.related.clear();
        self.error = None;
        self.reaction = Reaction::None;
        self.subscribed = false;
        self.thread.reset(video_id);
    }

    /// Cancels everything outstanding; used when leaving the page.
    pub fn close(&mut self) {
        self.video_flight.cancel();
        self.related_flight.cancel();
        self.video_id = None;
        self.video = None;
        self.related.clear();
        self.error = None;
        self.thread.close();
    }

    pub fn retry(
        &mut self,
        catalog: &Arc<dyn CatalogService>,
        comments: &Arc<dyn CommentService>,
        tx: &Sender<AsyncResponse>,
    ) {
        if let Some(id) = self.video_id.clone() {
            self.open(&id, catalog, comments, tx);
        }
    }

    pub fn fetch_video(&mut self, catalog: &Arc<dyn CatalogService>, tx: &Sender<AsyncResponse>) -> bool {
        let Some(video_id) = self.video_id.clone() else {
            return false;
        };
        let Some(ticket) = self.video_flight.begin() else {
            return false;
        };
        let service = catalog.clone();
        let id = video_id.clone();
        flight::spawn(
            ticket,
            tx,
            move || service.get_video(&id),
            move |request_id, result| AsyncResponse::Video {
                request_id,
                video_id,
                result,
            },
        );
        true
    }

    pub fn fetch_related(&mut self, catalog: &Arc<dyn CatalogService>, tx: &Sender<AsyncResponse>) -> bool {
        let Some(video_id) = self.video_id.clone() else {
            return false;
        };
        let Some(ticket) = self.related_flight.begin() else {
            return false;
        };
        let service = catalog.clone();
        let current = video_id.clone();
        flight::spawn(
            ticket,
            tx,
            move || {
                let videos = service.list_videos()?;
                Ok(filter::related(&videos, &current))
            },
            move |request_id, result| AsyncResponse::Related {
                request_id,
                video_id,
                result,
            },
        );
        true
    }

    pub fn apply_video(&mut self, request_id: u64, video_id: &str, result: Result<Video>) -> bool {
        if self.video_id.as_deref() != Some(video_id) || !self.video_flight.settle(request_id) {
            return false;
        }
        match result {
            Ok(video) => {
                self.video = Some(video);
                self.error = None;
            }
            Err(err) => {
                warn!(video_id, error = %format!("{err:#}"), "video fetch failed");
                self.error = Some(if api::is_not_found(&err) {
                    NOT_FOUND.to_string()
                } else {
                    api::error_message(&err)
                });
            }
        }
        true
    }

    /// Related-list failures only log; the sidebar stays empty.
    pub fn apply_related(
        &mut self,
        request_id: u64,
        video_id: &str,
        result: Result<Vec<Video>>,
    ) -> bool {
        if self.video_id.as_deref() != Some(video_id) || !self.related_flight.settle(request_id) {
            return false;
        }
        match result {
            Ok(related) => self.related = related,
            Err(err) => warn!(video_id, error = %format!("{err:#}"), "related fetch failed"),
        }
        true
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn video(&self) -> Option<&Video> {
        self.video.as_ref()
    }

    pub fn related(&self) -> &[Video] {
        &self.related
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.video_flight.in_flight()
    }

    pub fn reaction(&self) -> Reaction {
        self.reaction
    }

    pub fn toggle_like(&mut self) {
        self.reaction = self.reaction.toggle_like();
    }

    pub fn toggle_dislike(&mut self) {
        self.reaction = self.reaction.toggle_dislike();
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn toggle_subscribe(&mut self) {
        self.subscribed = !self.subscribed;
    }

    pub fn thread(&self) -> &CommentThread {
        &self.thread
    }

    pub fn thread_mut(&mut self) -> &mut CommentThread {
        &mut self.thread
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crossbeam_channel::{unbounded, Receiver};

    use crate::data::{sample_videos, MockCatalogService, MockCommentService};

    fn services() -> (Arc<dyn CatalogService>, Arc<dyn CommentService>) {
        (
            Arc::new(MockCatalogService::default()),
            Arc::new(MockCommentService::default()),
        )
    }

    fn drain(view: &mut DetailView, rx: &Receiver<AsyncResponse>, expected: usize) {
        for _ in 0..expected {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                AsyncResponse::Video {
                    request_id,
                    video_id,
                    result,
                } => {
                    view.apply_video(request_id, &video_id, result);
                }
                AsyncResponse::Related {
                    request_id,
                    video_id,
                    result,
                } => {
                    view.apply_related(request_id, &video_id, result);
                }
                AsyncResponse::Comments {
                    request_id,
                    generation,
                    result,
                } => {
                    view.thread_mut().apply_fetched(request_id, generation, result);
                }
                _ => panic!("unexpected response"),
            }
        }
    }

    #[test]
    fn open_loads_video_related_and_comments() {
        let (catalog, comments) = services();
        let (tx, rx) = unbounded();
        let mut view = DetailView::default();
        view.open("1", &catalog, &comments, &tx);
        drain(&mut view, &rx, 3);

        assert_eq!(view.video().unwrap().id, "1");
        assert_eq!(view.related().len(), 5);
        assert!(view.related().iter().all(|video| video.id != "1"));
        assert_eq!(view.thread().entries().len(), 2);
        assert!(view.error().is_none());
    }

    #[test]
    fn switching_ids_clears_state_before_new_results() {
        let (catalog, comments) = services();
        let (tx, rx) = unbounded();
        let mut view = DetailView::default();
        view.open("1", &catalog, &comments, &tx);
        drain(&mut view, &rx, 3);
        view.toggle_like();

        view.reset("2");
        assert_eq!(view.video_id(), Some("2"));
        assert!(view.video().is_none());
        assert!(view.related().is_empty());
        assert!(view.error().is_none());
        assert_eq!(view.reaction(), Reaction::None);
        assert!(view.thread().entries().is_empty());
    }

    #[test]
    fn late_response_for_previous_id_is_ignored() {
        let mut view = DetailView::default();
        view.reset("a");
        let stale = view.video_flight.begin().unwrap();
        view.reset("b");
        let fresh = view.video_flight.begin().unwrap();

        let mut a = sample_videos().remove(0);
        a.id = "a".into();
        assert!(!view.apply_video(stale.id(), "a", Ok(a)));
        assert!(view.video().is_none());

        let mut b = sample_videos().remove(1);
        b.id = "b".into();
        assert!(view.apply_video(fresh.id(), "b", Ok(b)));
        assert_eq!(view.video().unwrap().id, "b");
    }

    #[derive(Default)]
    struct CountingCatalog {
        inner: MockCatalogService,
        list_calls: AtomicUsize,
        get_calls: AtomicUsize,
    }

    impl CatalogService for CountingCatalog {
        fn list_videos(&self) -> Result<Vec<Video>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_videos()
        }

        fn get_video(&self, id: &str) -> Result<Video> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_video(id)
        }
    }

    #[test]
    fn video_and_related_fetches_are_single_flight() {
        let counting = Arc::new(CountingCatalog::default());
        let catalog: Arc<dyn CatalogService> = counting.clone();
        let (tx, rx) = unbounded();
        let mut view = DetailView::default();
        view.reset("1");

        assert!(view.fetch_video(&catalog, &tx));
        assert!(!view.fetch_video(&catalog, &tx));
        assert!(view.fetch_related(&catalog, &tx));
        assert!(!view.fetch_related(&catalog, &tx));

        let mut videos = 0;
        let mut related = 0;
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                AsyncResponse::Video {
                    request_id,
                    video_id,
                    result,
                } => {
                    videos += 1;
                    assert!(view.apply_video(request_id, &video_id, result));
                }
                AsyncResponse::Related {
                    request_id,
                    video_id,
                    result,
                } => {
                    related += 1;
                    assert!(view.apply_related(request_id, &video_id, result));
                }
                _ => panic!("unexpected response"),
            }
        }
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!((videos, related), (1, 1));
        assert_eq!(counting.get_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counting.list_calls.load(Ordering::SeqCst), 1);

        assert!(view.fetch_video(&catalog, &tx), "gate reopens once settled");
    }

    #[test]
    fn missing_video_reports_not_found() {
        let (catalog, comments) = services();
        let (tx, rx) = unbounded();
        let mut view = DetailView::default();
        view.open("missing", &catalog, &comments, &tx);
        drain(&mut view, &rx, 3);

        assert_eq!(view.error(), Some(NOT_FOUND));
        assert!(view.video().is_none());
        assert_eq!(view.related().len(), 6);
    }

    #[test]
    fn like_and_dislike_are_exclusive() {
        let mut view = DetailView::default();
        view.toggle_like();
        assert_eq!(view.reaction(), Reaction::Liked);
        view.toggle_dislike();
        assert_eq!(view.reaction(), Reaction::Disliked);
        view.toggle_dislike();
        assert_eq!(view.reaction(), Reaction::None);
        view.toggle_subscribe();
        assert!(view.is_subscribed());
    }
}
