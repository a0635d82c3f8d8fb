use anyhow::Result;

use crate::models::{AuthResponse, Comment, Video};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Login,
    Signup,
}

/// Results delivered from worker threads to the UI thread.
pub enum AsyncResponse {
    Catalog {
        request_id: u64,
        result: Result<Vec<Video>>,
    },
    Video {
        request_id: u64,
        video_id: String,
        result: Result<Video>,
    },
    Related {
        request_id: u64,
        video_id: String,
        result: Result<Vec<Video>>,
    },
    Comments {
        request_id: u64,
        generation: u64,
        result: Result<Vec<Comment>>,
    },
    CommentCreated {
        request_id: u64,
        generation: u64,
        temp_id: u64,
        result: Result<Comment>,
    },
    CommentEdited {
        generation: u64,
        comment_id: String,
        text: String,
        result: Result<()>,
    },
    CommentDeleted {
        generation: u64,
        comment_id: String,
        result: Result<()>,
    },
    Auth {
        action: AuthAction,
        result: Result<AuthResponse>,
    },
}
