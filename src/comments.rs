//! Comment thread for a single video.
//!
//! Comments created locally show up immediately as [`Entry::Pending`] and are
//! reconciled when the server answers: a success swaps the pending entry for
//! the server's copy in place, a failure strips every pending entry. Edits and
//! deletes are applied only after the server confirms them.
//!
//! Every response carries the thread generation it was issued under. Opening
//! another video bumps the generation, so late answers for the previous video
//! are dropped instead of leaking into the new thread.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::api;
use crate::data::CommentService;
use crate::event::AsyncResponse;
use crate::flight::{self, Flight};
use crate::models::{Comment, NewComment};
use crate::session::Session;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommentError {
    #[error("Please sign in to comment")]
    NotSignedIn,
    #[error("Comment cannot be empty")]
    EmptyText,
    #[error("Your previous comment is still posting")]
    Busy,
    #[error("No video selected")]
    NoVideo,
    #[error("Comment not found")]
    UnknownComment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Confirmed(Comment),
    Pending { temp_id: u64, draft: Comment },
}

impl Entry {
    pub fn comment(&self) -> &Comment {
        match self {
            Entry::Confirmed(comment) => comment,
            Entry::Pending { draft, .. } => draft,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Entry::Pending { .. })
    }

    fn confirmed_id(&self) -> Option<&str> {
        match self {
            Entry::Confirmed(comment) => Some(&comment.id),
            Entry::Pending { .. } => None,
        }
    }
}

#[derive(Default)]
pub struct CommentThread {
    video_id: Option<String>,
    generation: u64,
    entries: Vec<Entry>,
    input: String,
    loaded: bool,
    error: Option<String>,
    next_temp_id: u64,
    fetch: Flight,
    create: Flight,
}

impl CommentThread {
    /// Points the thread at `video_id`, dropping everything from the previous video.
    pub fn reset(&mut self, video_id: &str) {
        self.fetch.cancel();
        self.create.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.video_id = Some(video_id.to_string());
        self.entries.clear();
        self.input.clear();
        self.loaded = false;
        self.error = None;
    }

    /// Detaches from any video; used when the detail view unmounts.
    pub fn close(&mut self) {
        self.fetch.cancel();
        self.create.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.video_id = None;
        self.entries.clear();
        self.input.clear();
        self.loaded = false;
        self.error = None;
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn is_loading(&self) -> bool {
        self.fetch.in_flight()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The input stays locked while a post is outstanding.
    pub fn is_posting(&self) -> bool {
        self.create.in_flight()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn fetch(&mut self, service: &Arc<dyn CommentService>, tx: &Sender<AsyncResponse>) -> bool {
        let Some(video_id) = self.video_id.clone() else {
            return false;
        };
        let Some(ticket) = self.fetch.begin() else {
            debug!(video_id = %video_id, "comment fetch already in flight");
            return false;
        };
        self.error = None;
        let generation = self.generation;
        let service = service.clone();
        flight::spawn(
            ticket,
            tx,
            move || service.list_comments(&video_id),
            move |request_id, result| AsyncResponse::Comments {
                request_id,
                generation,
                result,
            },
        );
        true
    }

    pub fn apply_fetched(
        &mut self,
        request_id: u64,
        generation: u64,
        result: Result<Vec<Comment>>,
    ) -> bool {
        if generation != self.generation || !self.fetch.settle(request_id) {
            return false;
        }
        match result {
            Ok(comments) => {
                debug!(count = comments.len(), "comments loaded");
                self.entries = comments.into_iter().map(Entry::Confirmed).collect();
                self.loaded = true;
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "comment fetch failed");
                self.error = Some(format!("Failed to load comments: {}", api::error_message(&err)));
            }
        }
        true
    }

    /// Posts the current input. The pending entry is visible as soon as this returns.
    pub fn submit(
        &mut self,
        session: &Session,
        service: &Arc<dyn CommentService>,
        tx: &Sender<AsyncResponse>,
    ) -> Result<u64, CommentError> {
        let video_id = self.video_id.clone().ok_or(CommentError::NoVideo)?;
        let user = session.current_user().ok_or(CommentError::NotSignedIn)?;
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return Err(CommentError::EmptyText);
        }
        let ticket = self.create.begin().ok_or(CommentError::Busy)?;

        self.next_temp_id = self.next_temp_id.wrapping_add(1);
        let temp_id = self.next_temp_id;
        let draft = Comment {
            id: String::new(),
            video_id: video_id.clone(),
            user_id: user.id.clone(),
            username: user.display_name().to_string(),
            avatar: user.avatar.clone(),
            text: text.clone(),
            created_at: Some(Utc::now()),
        };
        self.entries.insert(0, Entry::Pending { temp_id, draft });
        self.input.clear();

        let body = NewComment {
            video_id,
            text,
            username: user.display_name().to_string(),
            avatar: user.avatar.unwrap_or_default(),
        };
        let generation = self.generation;
        let service = service.clone();
        flight::spawn(
            ticket,
            tx,
            move || service.create_comment(&body),
            move |request_id, result| AsyncResponse::CommentCreated {
                request_id,
                generation,
                temp_id,
                result,
            },
        );
        Ok(temp_id)
    }

    /// Reconciles a finished post. Returns the message to show when it failed.
    pub fn apply_created(
        &mut self,
        request_id: u64,
        generation: u64,
        temp_id: u64,
        result: Result<Comment>,
        service: &Arc<dyn CommentService>,
        tx: &Sender<AsyncResponse>,
    ) -> Option<String> {
        if generation != self.generation || !self.create.settle(request_id) {
            return None;
        }
        match result {
            Ok(comment) => {
                info!(comment_id = %comment.id, "comment posted");
                let slot = self.entries.iter_mut().find(
                    |entry| matches!(entry, Entry::Pending { temp_id: id, .. } if *id == temp_id),
                );
                match slot {
                    Some(slot) => *slot = Entry::Confirmed(comment),
                    None => self.entries.insert(0, Entry::Confirmed(comment)),
                }
                self.fetch(service, tx);
                None
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "comment post failed");
                self.entries.retain(|entry| !entry.is_pending());
                Some(format!("Failed to post comment: {}", api::error_message(&err)))
            }
        }
    }

    pub fn edit(
        &mut self,
        comment_id: &str,
        text: &str,
        service: &Arc<dyn CommentService>,
        tx: &Sender<AsyncResponse>,
    ) -> Result<(), CommentError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(CommentError::EmptyText);
        }
        self.require_confirmed(comment_id)?;

        let generation = self.generation;
        let comment_id = comment_id.to_string();
        let service = service.clone();
        let (id, body) = (comment_id.clone(), text.clone());
        flight::spawn_detached(
            tx,
            move || service.update_comment(&id, &body),
            move |result| AsyncResponse::CommentEdited {
                generation,
                comment_id,
                text,
                result,
            },
        );
        Ok(())
    }

    pub fn apply_edited(
        &mut self,
        generation: u64,
        comment_id: &str,
        text: String,
        result: Result<()>,
    ) -> Option<String> {
        if generation != self.generation {
            return None;
        }
        match result {
            Ok(()) => {
                let target = self
                    .entries
                    .iter_mut()
                    .find(|entry| entry.confirmed_id() == Some(comment_id));
                if let Some(Entry::Confirmed(comment)) = target {
                    comment.text = text;
                }
                None
            }
            Err(err) => {
                warn!(comment_id, error = %format!("{err:#}"), "comment edit failed");
                Some(format!("Failed to update comment: {}", api::error_message(&err)))
            }
        }
    }

    /// Issues the delete. Callers confirm with the user first.
    pub fn delete(
        &mut self,
        comment_id: &str,
        service: &Arc<dyn CommentService>,
        tx: &Sender<AsyncResponse>,
    ) -> Result<(), CommentError> {
        self.require_confirmed(comment_id)?;

        let generation = self.generation;
        let comment_id = comment_id.to_string();
        let id = comment_id.clone();
        let service = service.clone();
        flight::spawn_detached(
            tx,
            move || service.delete_comment(&id),
            move |result| AsyncResponse::CommentDeleted {
                generation,
                comment_id,
                result,
            },
        );
        Ok(())
    }

    pub fn apply_deleted(
        &mut self,
        generation: u64,
        comment_id: &str,
        result: Result<()>,
    ) -> Option<String> {
        if generation != self.generation {
            return None;
        }
        match result {
            Ok(()) => {
                self.entries
                    .retain(|entry| entry.confirmed_id() != Some(comment_id));
                None
            }
            Err(err) => {
                warn!(comment_id, error = %format!("{err:#}"), "comment delete failed");
                Some(format!("Failed to delete comment: {}", api::error_message(&err)))
            }
        }
    }

    fn require_confirmed(&self, comment_id: &str) -> Result<(), CommentError> {
        if self
            .entries
            .iter()
            .any(|entry| entry.confirmed_id() == Some(comment_id))
        {
            Ok(())
        } else {
            Err(CommentError::UnknownComment)
        }
    }
}

/// Edit and delete are offered only on the signed-in user's own confirmed comments.
pub fn can_modify(entry: &Entry, session: &Session) -> bool {
    match entry {
        Entry::Confirmed(comment) => session.owns(&comment.user_id),
        Entry::Pending { .. } => false,
    }
}

/// Age label for a comment; one sent without a timestamp gets none.
pub fn age_label(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    created_at
        .map(|ts| format_relative(ts, now))
        .unwrap_or_default()
}

pub fn format_relative(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let hours = elapsed.num_hours();
    if hours < 1 {
        return "Just now".to_string();
    }
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = elapsed.num_days();
    if days < 7 {
        return plural(days, "day");
    }
    timestamp.with_timezone(&Local).format("%-m/%-d/%Y").to_string()
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use anyhow::anyhow;
    use chrono::Duration as ChronoDuration;
    use crossbeam_channel::{unbounded, Receiver};

    use crate::data::MockCommentService;
    use crate::models::{AuthResponse, User};
    use crate::storage::Store;

    fn signed_in(id: &str) -> Session {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let session = Session::init(store).unwrap();
        session
            .login(AuthResponse {
                token: "tok".into(),
                user: User {
                    id: id.into(),
                    username: id.into(),
                    avatar: Some("https://img/a.png".into()),
                    email: None,
                },
            })
            .unwrap();
        session
    }

    fn comment(id: &str, author: &str, text: &str) -> Comment {
        Comment {
            id: id.into(),
            video_id: "v1".into(),
            user_id: author.into(),
            username: author.into(),
            avatar: None,
            text: text.into(),
            created_at: Some(Utc::now()),
        }
    }

    fn loaded_thread(comments: Vec<Comment>) -> CommentThread {
        let mut thread = CommentThread::default();
        thread.reset("v1");
        let ticket = thread.fetch.begin().unwrap();
        let generation = thread.generation();
        assert!(thread.apply_fetched(ticket.id(), generation, Ok(comments)));
        thread
    }

    fn next(rx: &Receiver<AsyncResponse>) -> AsyncResponse {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    /// Comment service whose every call fails with a server error.
    struct Rejecting;

    impl CommentService for Rejecting {
        fn list_comments(&self, _: &str) -> Result<Vec<Comment>> {
            Err(anyhow!("offline"))
        }
        fn create_comment(&self, _: &NewComment) -> Result<Comment> {
            Err(api::ApiError::Status {
                status: 500,
                message: "Server exploded".into(),
            }
            .into())
        }
        fn update_comment(&self, _: &str, _: &str) -> Result<()> {
            Err(anyhow!("offline"))
        }
        fn delete_comment(&self, _: &str) -> Result<()> {
            Err(anyhow!("offline"))
        }
    }

    /// Echoes the draft back with a fixed server id.
    struct Accepting;

    impl CommentService for Accepting {
        fn list_comments(&self, _: &str) -> Result<Vec<Comment>> {
            Ok(Vec::new())
        }
        fn create_comment(&self, draft: &NewComment) -> Result<Comment> {
            Ok(Comment {
                id: "srv-9".into(),
                video_id: draft.video_id.clone(),
                user_id: "u1".into(),
                username: draft.username.clone(),
                avatar: None,
                text: draft.text.clone(),
                created_at: Some(Utc::now()),
            })
        }
        fn update_comment(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        fn delete_comment(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn pending_entry_is_prepended_before_the_server_answers() {
        let session = signed_in("u1");
        let service: Arc<dyn CommentService> = Arc::new(Accepting);
        let (tx, _rx) = unbounded();
        let mut thread = loaded_thread(vec![comment("c1", "u2", "older")]);
        thread.input_mut().push_str("  hello there  ");

        thread.submit(&session, &service, &tx).unwrap();

        assert!(thread.input().is_empty());
        assert!(thread.entries()[0].is_pending());
        assert_eq!(thread.entries()[0].comment().text, "hello there");
        assert_eq!(thread.entries()[0].comment().username, "u1");
        assert_eq!(thread.entries().len(), 2);
    }

    #[test]
    fn successful_post_replaces_pending_entry() {
        let session = signed_in("u1");
        let service: Arc<dyn CommentService> = Arc::new(Accepting);
        let (tx, rx) = unbounded();
        let mut thread = loaded_thread(vec![comment("c1", "u2", "older")]);
        thread.input_mut().push_str("hello");
        thread.submit(&session, &service, &tx).unwrap();

        let AsyncResponse::CommentCreated {
            request_id,
            generation,
            temp_id,
            result,
        } = next(&rx)
        else {
            panic!("expected a create response");
        };
        let notice = thread.apply_created(request_id, generation, temp_id, result, &service, &tx);
        assert!(notice.is_none());

        let matching: Vec<_> = thread
            .entries()
            .iter()
            .filter(|entry| entry.comment().text == "hello")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0], &Entry::Confirmed(matching[0].comment().clone()));
        assert_eq!(matching[0].comment().id, "srv-9");
        assert!(thread.entries().iter().all(|entry| !entry.is_pending()));
        assert!(thread.is_loading(), "a post triggers a reconciling refetch");
        assert!(!thread.is_posting());
    }

    #[test]
    fn failed_post_rolls_back_and_reports() {
        let session = signed_in("u1");
        let service: Arc<dyn CommentService> = Arc::new(Rejecting);
        let (tx, rx) = unbounded();
        let before = vec![comment("c1", "u2", "older")];
        let mut thread = loaded_thread(before.clone());
        thread.input_mut().push_str("doomed");
        thread.submit(&session, &service, &tx).unwrap();

        let AsyncResponse::CommentCreated {
            request_id,
            generation,
            temp_id,
            result,
        } = next(&rx)
        else {
            panic!("expected a create response");
        };
        let notice = thread
            .apply_created(request_id, generation, temp_id, result, &service, &tx)
            .unwrap();
        assert_eq!(notice, "Failed to post comment: Server exploded");
        let expected: Vec<Entry> = before.into_iter().map(Entry::Confirmed).collect();
        assert_eq!(thread.entries(), expected.as_slice());
        assert!(!thread.is_loading());
    }

    #[test]
    fn submit_is_refused_while_posting_or_invalid() {
        let session = signed_in("u1");
        let service: Arc<dyn CommentService> = Arc::new(Accepting);
        let (tx, _rx) = unbounded();
        let mut thread = loaded_thread(Vec::new());

        assert_eq!(
            thread.submit(&session, &service, &tx),
            Err(CommentError::EmptyText)
        );

        thread.input_mut().push_str("first");
        thread.submit(&session, &service, &tx).unwrap();
        thread.input_mut().push_str("second");
        assert_eq!(thread.submit(&session, &service, &tx), Err(CommentError::Busy));
        assert_eq!(thread.input(), "second");
        assert_eq!(thread.entries().len(), 1);

        let anonymous = Session::init(Arc::new(Store::open_in_memory().unwrap())).unwrap();
        let mut fresh = loaded_thread(Vec::new());
        fresh.input_mut().push_str("hi");
        assert_eq!(
            fresh.submit(&anonymous, &service, &tx),
            Err(CommentError::NotSignedIn)
        );
    }

    #[test]
    fn edit_changes_only_the_target() {
        let mut thread = loaded_thread(vec![
            comment("c1", "u1", "one"),
            comment("c2", "u1", "two"),
            comment("c3", "u2", "three"),
        ]);
        let before = thread.entries().to_vec();
        let generation = thread.generation();

        assert!(thread
            .apply_edited(generation, "c2", "TWO".into(), Ok(()))
            .is_none());
        assert_eq!(thread.entries()[0], before[0]);
        assert_eq!(thread.entries()[2], before[2]);
        assert_eq!(thread.entries()[1].comment().text, "TWO");
        assert_eq!(thread.entries()[1].comment().id, "c2");
    }

    #[test]
    fn failed_edit_and_delete_leave_the_list_untouched() {
        let mut thread = loaded_thread(vec![comment("c1", "u1", "one"), comment("c2", "u1", "two")]);
        let before = thread.entries().to_vec();
        let generation = thread.generation();

        let edit = thread.apply_edited(generation, "c1", "x".into(), Err(anyhow!("boom")));
        assert!(edit.unwrap().starts_with("Failed to update comment"));
        let delete = thread.apply_deleted(generation, "c1", Err(anyhow!("boom")));
        assert!(delete.unwrap().starts_with("Failed to delete comment"));
        assert_eq!(thread.entries(), before.as_slice());
    }

    #[test]
    fn delete_removes_only_the_target() {
        let mut thread = loaded_thread(vec![
            comment("c1", "u1", "one"),
            comment("c2", "u1", "two"),
            comment("c3", "u2", "three"),
        ]);
        let generation = thread.generation();
        assert!(thread.apply_deleted(generation, "c2", Ok(())).is_none());
        let ids: Vec<&str> = thread
            .entries()
            .iter()
            .map(|entry| entry.comment().id.as_str())
            .collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[test]
    fn edit_round_trips_through_the_service() {
        let session = signed_in("user-demo");
        let mock = Arc::new(MockCommentService::default());
        mock.set_author(session.current_user());
        let service: Arc<dyn CommentService> = mock.clone();
        let (tx, rx) = unbounded();

        let mut thread = CommentThread::default();
        thread.reset("1");
        assert!(thread.fetch(&service, &tx));
        assert!(!thread.fetch(&service, &tx));
        let AsyncResponse::Comments {
            request_id,
            generation,
            result,
        } = next(&rx)
        else {
            panic!("expected comments");
        };
        assert!(thread.apply_fetched(request_id, generation, result));
        assert_eq!(thread.entries().len(), 2);

        thread.edit("seed-2", "  edited  ", &service, &tx).unwrap();
        let AsyncResponse::CommentEdited {
            generation,
            comment_id,
            text,
            result,
        } = next(&rx)
        else {
            panic!("expected an edit response");
        };
        assert!(thread
            .apply_edited(generation, &comment_id, text, result)
            .is_none());
        assert_eq!(thread.entries()[1].comment().text, "edited");

        thread.delete("seed-1", &service, &tx).unwrap();
        let AsyncResponse::CommentDeleted {
            generation,
            comment_id,
            result,
        } = next(&rx)
        else {
            panic!("expected a delete response");
        };
        let notice = thread.apply_deleted(generation, &comment_id, result).unwrap();
        assert!(notice.contains("Not authorized"));
        assert_eq!(thread.entries().len(), 2);
    }

    #[test]
    fn pending_entries_cannot_be_edited() {
        let session = signed_in("u1");
        let service: Arc<dyn CommentService> = Arc::new(Accepting);
        let (tx, _rx) = unbounded();
        let mut thread = loaded_thread(Vec::new());
        thread.input_mut().push_str("wip");
        thread.submit(&session, &service, &tx).unwrap();

        assert!(!can_modify(&thread.entries()[0], &session));
        assert_eq!(
            thread.edit("", "x", &service, &tx),
            Err(CommentError::UnknownComment)
        );
    }

    #[test]
    fn controls_follow_authorship() {
        let session = signed_in("u1");
        let mine = Entry::Confirmed(comment("c1", "u1", "mine"));
        let theirs = Entry::Confirmed(comment("c2", "u2", "theirs"));
        assert!(can_modify(&mine, &session));
        assert!(!can_modify(&theirs, &session));

        session.logout().unwrap();
        assert!(!can_modify(&mine, &session));
    }

    #[test]
    fn responses_for_a_previous_video_are_ignored() {
        let mut thread = CommentThread::default();
        thread.reset("v1");
        let ticket = thread.fetch.begin().unwrap();
        let old_generation = thread.generation();
        thread.reset("v2");

        assert!(!thread.apply_fetched(
            ticket.id(),
            old_generation,
            Ok(vec![comment("c1", "u1", "stale")])
        ));
        assert!(thread.entries().is_empty());
        assert!(thread
            .apply_deleted(old_generation, "c1", Ok(()))
            .is_none());
    }

    #[test]
    fn relative_time_boundaries() {
        let now = Utc::now();
        let ago = |minutes: i64| now - ChronoDuration::minutes(minutes);

        assert_eq!(format_relative(ago(30), now), "Just now");
        assert_eq!(format_relative(ago(59), now), "Just now");
        assert_eq!(format_relative(ago(60), now), "1 hour ago");
        assert_eq!(format_relative(ago(3 * 60), now), "3 hours ago");
        assert_eq!(format_relative(ago(24 * 60 - 1), now), "23 hours ago");
        assert_eq!(format_relative(ago(24 * 60), now), "1 day ago");
        assert_eq!(format_relative(ago(2 * 24 * 60), now), "2 days ago");
        assert_eq!(format_relative(ago(7 * 24 * 60 - 1), now), "6 days ago");

        let old = ago(10 * 24 * 60);
        let label = format_relative(old, now);
        assert!(!label.contains("ago"));
        assert_eq!(label, old.with_timezone(&Local).format("%-m/%-d/%Y").to_string());
    }

    #[test]
    fn future_timestamps_read_as_just_now() {
        let now = Utc::now();
        assert_eq!(format_relative(now + ChronoDuration::minutes(5), now), "Just now");
    }

    #[test]
    fn missing_timestamp_has_no_age_label() {
        let now = Utc::now();
        assert_eq!(age_label(None, now), "");
        assert_eq!(age_label(Some(now - ChronoDuration::hours(2)), now), "2 hours ago");
    }
}
