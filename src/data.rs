use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

use crate::api::{self, ApiError};
use crate::models::{Comment, CommentEdit, NewComment, User, Video};
use crate::session::Session;

pub trait CatalogService: Send + Sync {
    fn list_videos(&self) -> Result<Vec<Video>>;
    fn get_video(&self, id: &str) -> Result<Video>;
}

pub trait CommentService: Send + Sync {
    fn list_comments(&self, video_id: &str) -> Result<Vec<Comment>>;
    fn create_comment(&self, comment: &NewComment) -> Result<Comment>;
    fn update_comment(&self, id: &str, text: &str) -> Result<()>;
    fn delete_comment(&self, id: &str) -> Result<()>;
}

pub struct ApiCatalogService {
    client: Arc<api::Client>,
}

impl ApiCatalogService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CatalogService for ApiCatalogService {
    fn list_videos(&self) -> Result<Vec<Video>> {
        self.client.get("/videos").context("fetch videos")
    }

    fn get_video(&self, id: &str) -> Result<Video> {
        self.client
            .get(&format!("/videos/{}", encode_segment(id)))
            .with_context(|| format!("fetch video {id}"))
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn list_comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        self.client
            .get(&format!("/comments/video/{}", encode_segment(video_id)))
            .with_context(|| format!("fetch comments for video {video_id}"))
    }

    fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.client
            .post("/comments", comment)
            .context("create comment")
    }

    fn update_comment(&self, id: &str, text: &str) -> Result<()> {
        let body = CommentEdit {
            text: text.to_string(),
        };
        self.client
            .put(&format!("/comments/{}", encode_segment(id)), &body)
            .with_context(|| format!("update comment {id}"))?;
        Ok(())
    }

    fn delete_comment(&self, id: &str) -> Result<()> {
        self.client
            .delete(&format!("/comments/{}", encode_segment(id)))
            .with_context(|| format!("delete comment {id}"))?;
        Ok(())
    }
}

fn encode_segment(raw: &str) -> String {
    percent_encoding::utf8_percent_encode(raw, percent_encoding::NON_ALPHANUMERIC).to_string()
}

/// Offline catalog used by `--demo` and tests.
pub struct MockCatalogService {
    videos: Vec<Video>,
}

impl Default for MockCatalogService {
    fn default() -> Self {
        Self {
            videos: sample_videos(),
        }
    }
}

impl MockCatalogService {
    pub fn with_videos(videos: Vec<Video>) -> Self {
        Self { videos }
    }
}

impl CatalogService for MockCatalogService {
    fn list_videos(&self) -> Result<Vec<Video>> {
        Ok(self.videos.clone())
    }

    fn get_video(&self, id: &str) -> Result<Video> {
        self.videos
            .iter()
            .find(|video| video.id == id)
            .cloned()
            .ok_or_else(|| {
                ApiError::Status {
                    status: 404,
                    message: "Video not found".into(),
                }
                .into()
            })
    }
}

/// In-memory comment store; enforces authorship like the real server would.
pub struct MockCommentService {
    comments: Mutex<Vec<Comment>>,
    author: Mutex<Option<User>>,
    session: Option<Arc<Session>>,
    next_id: AtomicU64,
}

impl Default for MockCommentService {
    fn default() -> Self {
        Self {
            comments: Mutex::new(sample_comments()),
            author: Mutex::new(None),
            session: None,
            next_id: AtomicU64::new(1),
        }
    }
}

impl MockCommentService {
    /// Acts as whoever is signed in to `session`, the way a bearer token would.
    pub fn with_session(session: Arc<Session>) -> Self {
        Self {
            session: Some(session),
            ..Self::default()
        }
    }

    pub fn set_author(&self, user: Option<User>) {
        *self.author.lock() = user;
    }

    fn author(&self) -> Option<User> {
        match &self.session {
            Some(session) => session.current_user(),
            None => self.author.lock().clone(),
        }
    }

    fn forbidden() -> anyhow::Error {
        ApiError::Status {
            status: 403,
            message: "Not authorized".into(),
        }
        .into()
    }
}

impl CommentService for MockCommentService {
    fn list_comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .lock()
            .iter()
            .filter(|comment| comment.video_id == video_id)
            .cloned()
            .collect())
    }

    fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let Some(author) = self.author() else {
            return Err(ApiError::Status {
                status: 401,
                message: "Please sign in to comment".into(),
            }
            .into());
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = Comment {
            id: format!("mock-comment-{id}"),
            video_id: comment.video_id.clone(),
            user_id: author.id,
            username: comment.username.clone(),
            avatar: Some(comment.avatar.clone()).filter(|a| !a.is_empty()),
            text: comment.text.clone(),
            created_at: Some(Utc::now()),
        };
        self.comments.lock().insert(0, created.clone());
        Ok(created)
    }

    fn update_comment(&self, id: &str, text: &str) -> Result<()> {
        let author = self.author().ok_or_else(Self::forbidden)?;
        let mut comments = self.comments.lock();
        let comment = comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "Comment not found".into(),
            })?;
        if comment.user_id != author.id {
            return Err(Self::forbidden());
        }
        comment.text = text.to_string();
        Ok(())
    }

    fn delete_comment(&self, id: &str) -> Result<()> {
        let author = self.author().ok_or_else(Self::forbidden)?;
        let mut comments = self.comments.lock();
        let index = comments
            .iter()
            .position(|comment| comment.id == id)
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "Comment not found".into(),
            })?;
        if comments[index].user_id != author.id {
            return Err(Self::forbidden());
        }
        comments.remove(index);
        Ok(())
    }
}

const SAMPLE_MEDIA_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

pub fn sample_videos() -> Vec<Video> {
    let entries: [(&str, &str, &str, &str, &[&str]); 6] = [
        (
            "1",
            "Learning Rust ownership in 20 minutes",
            "Borrowing, moves and lifetimes explained with diagrams.",
            "Education",
            &["Rust", "Programming"],
        ),
        (
            "2",
            "Lo-fi beats to refactor to",
            "Two hours of calm music for deep work.",
            "Music",
            &["Music", "Focus"],
        ),
        (
            "3",
            "Speedrunning a roguelike",
            "World record attempt with commentary.",
            "Gaming",
            &["Gaming", "Speedrun"],
        ),
        (
            "4",
            "Intro to machine learning",
            "Gradient descent from scratch in Python.",
            "Education",
            &["Machine Learning", "Python", "AI"],
        ),
        (
            "5",
            "Building a React dashboard",
            "Hooks, routing and state in one sitting.",
            "Education",
            &["React", "JavaScript", "Web Development"],
        ),
        (
            "6",
            "Weekly tech news roundup",
            "What happened in crypto, AI and open source this week.",
            "News",
            &["Crypto", "AI"],
        ),
    ];

    entries
        .iter()
        .map(|(id, title, description, category, tags)| {
            let n = id.parse::<usize>().unwrap_or(1);
            Video {
                id: id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                thumbnail_url: format!("https://picsum.photos/seed/zutube{n}/640/360"),
                video_url: SAMPLE_MEDIA_URL.into(),
                channel_name: format!("{category} Channel"),
                channel_logo: None,
                is_verified: n % 2 == 1,
                views: format!("{}K", n * 13),
                upload_time: format!("{n} days ago"),
                likes: (100 + n * 11).to_string(),
                dislikes: n.to_string(),
                duration: Some(format!("1{n}:0{n}")),
                category: category.to_string(),
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
                subscriber: "12K".into(),
            }
        })
        .collect()
}

fn sample_comments() -> Vec<Comment> {
    let now = Utc::now();
    vec![
        Comment {
            id: "seed-1".into(),
            video_id: "1".into(),
            user_id: "user-ferris".into(),
            username: "ferris".into(),
            avatar: None,
            text: "The borrow checker finally clicked for me.".into(),
            created_at: Some(now - ChronoDuration::hours(3)),
        },
        Comment {
            id: "seed-2".into(),
            video_id: "1".into(),
            user_id: "user-demo".into(),
            username: "demo".into(),
            avatar: None,
            text: "Great pacing, thanks!".into(),
            created_at: Some(now - ChronoDuration::days(2)),
        },
    ]
}
