use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub mod engine;

pub use engine::{rank_many, score};

/// Engagement signals for one candidate video, as read from the store.
/// Counts come out of SQL aggregates as `i64` and are validated non-negative
/// before they ever reach the scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSignals {
    pub id: Uuid,
    pub channel_id: Uuid,
    /// Author's accumulated boost points.
    pub boost_points: i64,
    pub created_at: DateTime<Utc>,
    pub views: i64,
    /// Mean rating in [0, 5]; 0 when the video has no ratings yet.
    pub average_rating: f64,
    pub ratings_count: i64,
    pub comments_count: i64,
    pub category_id: Option<Uuid>,
    /// Whether this viewer already has a view record for the video.
    pub is_watched: bool,
    pub is_featured: bool,
}

/// Everything the scorer knows about the requesting viewer. All fields are
/// empty for anonymous callers, which zeroes the viewer-specific terms.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub viewer_id: Option<Uuid>,
    pub followed_channels: HashSet<Uuid>,
    /// Historical view count per category, for affinity boosting.
    pub category_views: HashMap<Uuid, i64>,
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_following(&self, channel_id: Uuid) -> bool {
        self.followed_channels.contains(&channel_id)
    }

    pub fn category_view_count(&self, category_id: Option<Uuid>) -> i64 {
        category_id
            .and_then(|id| self.category_views.get(&id).copied())
            .unwrap_or(0)
    }
}

/// Where the ranked list will be rendered. The watch-next rail on a video
/// page gets an extra bonus for candidates sharing the current video's
/// category; the explorer grid has no current video and no such term.
#[derive(Debug, Clone)]
pub enum FeedContext {
    Explorer,
    WatchNext { current_category: Option<Uuid> },
}

/// A scored candidate, ready for feed rendering.
#[derive(Debug, Clone, Serialize)]
pub struct RankedVideo {
    #[serde(skip)]
    pub signals: VideoSignals,
    pub id: Uuid,
    pub score: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("negative {field} ({value}) on video {video_id}")]
    NegativeCount {
        video_id: Uuid,
        field: &'static str,
        value: i64,
    },
    #[error("average rating {value} out of range on video {video_id}")]
    RatingOutOfRange { video_id: Uuid, value: f64 },
}

impl VideoSignals {
    /// Boundary check before scoring. A failure here is an upstream
    /// data-integrity bug; the scorer itself never fails on validated input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("views", self.views),
            ("ratings_count", self.ratings_count),
            ("comments_count", self.comments_count),
            ("boost_points", self.boost_points),
        ] {
            if value < 0 {
                return Err(ValidationError::NegativeCount {
                    video_id: self.id,
                    field,
                    value,
                });
            }
        }

        if !self.average_rating.is_finite() || !(0.0..=5.0).contains(&self.average_rating) {
            return Err(ValidationError::RatingOutOfRange {
                video_id: self.id,
                value: self.average_rating,
            });
        }

        Ok(())
    }
}
