use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;

/// Author info embedded in video responses, with the level derived from
/// boost points at read time (levels are never stored).
#[derive(Debug, Serialize)]
pub struct ChannelSummary {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub boost_points: i64,
    pub level: u32,
}

/// A feed entry: the video, its author, and the relevance score it was
/// ranked with (absent on the featured rail, which is not scored).
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub id: Uuid,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub views: i64,
    pub average_rating: f64,
    pub ratings_count: i64,
    pub comments_count: i64,
    pub channel: ChannelSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Query parameters for the ranked feeds
#[derive(Debug, Deserialize)]
pub struct FeedFilter {
    pub limit: Option<i64>,
    pub category_id: Option<Uuid>,
    pub cursor_score: Option<f64>,
    pub cursor_id: Option<Uuid>,
}

/// Keyset cursor over (score, id). The id tie-break keeps pagination
/// deterministic when scores collide.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeedCursor {
    pub score: f64,
    pub id: Uuid,
}

/// Response for a ranked, paginated feed
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub items: Vec<VideoResponse>,
    pub next_cursor: Option<FeedCursor>,
}

/// Request payload for rating a video
#[derive(Debug, Deserialize, Validate)]
pub struct RateVideo {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
}
