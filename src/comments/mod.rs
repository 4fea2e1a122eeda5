use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod cache;
pub mod handler;

/// Database model for a comment
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub video_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a comment
#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Comment must be between 1 and 5000 characters"
    ))]
    pub body: String,
    pub parent_id: Option<Uuid>, // Optional: for nested replies
}

/// Author info embedded in comment responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
}

/// A comment with author info and viewer-relative state. This is the shape
/// both the query and mutation endpoints return; the server is authoritative
/// on every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub video_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author: CommentAuthor,
    pub body: String,
    pub like_count: i64,
    pub viewer_liked: bool,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Continuation cursor: creation timestamp of the last item, id as the
/// tie-break so pagination stays deterministic across equal timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommentCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Query parameters for paginated comment lists
#[derive(Debug, Deserialize)]
pub struct CommentPageFilter {
    pub limit: Option<i64>,
    pub cursor_ts: Option<DateTime<Utc>>,
    pub cursor_id: Option<Uuid>,
}

impl CommentPageFilter {
    pub fn cursor(&self) -> Option<CommentCursor> {
        match (self.cursor_ts, self.cursor_id) {
            (Some(created_at), Some(id)) => Some(CommentCursor { created_at, id }),
            _ => None,
        }
    }
}

/// One page of a comment list. `comment_count` is the video's aggregate
/// comment total, populated on uncursored (first-page) top-level queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub next_cursor: Option<CommentCursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
}
