use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::leveling::LevelProgress;

pub mod handler;

/// Channel profile with follow stats and the derived level progression. The
/// level block carries the same numbers the ranking engine's boost factor is
/// built from.
#[derive(Debug, Serialize)]
pub struct ChannelProfile {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub boost_points: i64,
    pub level: LevelProgress,
    pub followers_count: i64,
    pub video_count: i64,
    pub viewer_is_following: bool,
    pub created_at: DateTime<Utc>,
}

/// Response for follow/unfollow actions
#[derive(Debug, Serialize)]
pub struct FollowActionResponse {
    pub following: bool,
    pub followers_count: i64,
}
