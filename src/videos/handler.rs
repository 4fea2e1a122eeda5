use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt::{Claims, MaybeClaims},
    config::settings::Settings,
    error::AppError,
    leveling::compute_level,
    ranking::{rank_many, FeedContext, RankedVideo, VideoSignals, ViewerContext},
    response::ApiResponse,
    videos::{ChannelSummary, FeedCursor, FeedFilter, FeedResponse, RateVideo, VideoResponse},
};

/// Candidate row: display fields plus every signal the ranking engine reads.
#[derive(FromRow)]
struct VideoFromDb {
    id: Uuid,
    channel_id: Uuid,
    title: String,
    thumbnail_url: Option<String>,
    category_id: Option<Uuid>,
    is_featured: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    // Author fields
    channel_name: String,
    channel_image_url: Option<String>,
    boost_points: i64,
    // Engagement aggregates
    views: i64,
    average_rating: Option<f64>,
    ratings_count: i64,
    comments_count: i64,
    is_watched: bool,
}

const CANDIDATE_SELECT: &str = r#"
    SELECT
        v.id, v.channel_id, v.title, v.thumbnail_url, v.category_id,
        v.is_featured, v.created_at,
        ch.name AS channel_name, ch.image_url AS channel_image_url, ch.boost_points,
        COALESCE((SELECT SUM(vv.seen) FROM video_views vv WHERE vv.video_id = v.id), 0)::bigint AS views,
        (SELECT AVG(vr.rating)::float8 FROM video_ratings vr WHERE vr.video_id = v.id) AS average_rating,
        (SELECT COUNT(*) FROM video_ratings vr2 WHERE vr2.video_id = v.id) AS ratings_count,
        (SELECT COUNT(*) FROM comments c WHERE c.video_id = v.id) AS comments_count,
        EXISTS (
            SELECT 1 FROM video_views vv2
            WHERE vv2.video_id = v.id AND vv2.channel_id = $1
        ) AS is_watched
    FROM videos v
    JOIN channels ch ON v.channel_id = ch.id
    WHERE v.visibility = 'public' AND v.status <> 'processing'
"#;

impl VideoFromDb {
    fn signals(&self) -> VideoSignals {
        VideoSignals {
            id: self.id,
            channel_id: self.channel_id,
            boost_points: self.boost_points,
            created_at: self.created_at,
            views: self.views,
            average_rating: self.average_rating.unwrap_or(0.0),
            ratings_count: self.ratings_count,
            comments_count: self.comments_count,
            category_id: self.category_id,
            is_watched: self.is_watched,
            is_featured: self.is_featured,
        }
    }

    fn into_response(self, score: Option<f64>) -> VideoResponse {
        VideoResponse {
            id: self.id,
            title: self.title,
            thumbnail_url: self.thumbnail_url,
            category_id: self.category_id,
            is_featured: self.is_featured,
            created_at: self.created_at,
            views: self.views,
            average_rating: self.average_rating.unwrap_or(0.0),
            ratings_count: self.ratings_count,
            comments_count: self.comments_count,
            channel: ChannelSummary {
                id: self.channel_id,
                name: self.channel_name,
                image_url: self.channel_image_url,
                boost_points: self.boost_points,
                level: compute_level(self.boost_points.max(0) as u64).level,
            },
            score,
        }
    }
}

/// The ranked explorer feed, optionally filtered to one category.
/// GET /api/feed
pub async fn get_feed(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    MaybeClaims(claims): MaybeClaims,
    Query(filter): Query<FeedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = claims.map(|c| c.sub);

    let mut query_str = CANDIDATE_SELECT.to_string();
    if filter.category_id.is_some() {
        query_str.push_str(" AND v.category_id = $2");
    }
    query_str.push_str(&format!(
        " ORDER BY v.created_at DESC LIMIT {}",
        settings.feed_candidate_cap
    ));

    let mut query = sqlx::query_as::<_, VideoFromDb>(&query_str).bind(viewer_id);
    if let Some(category_id) = filter.category_id {
        query = query.bind(category_id);
    }

    let candidates = query.fetch_all(&pool).await.map_err(|e| {
        tracing::error!("Failed to fetch feed candidates: {:?}", e);
        AppError::InternalServerError
    })?;

    let viewer = build_viewer_context(&pool, viewer_id).await?;

    respond_ranked(candidates, &viewer, &FeedContext::Explorer, &filter)
}

/// The featured rail: curated videos by recency, unscored.
/// GET /api/feed/featured
pub async fn get_featured(
    State(pool): State<PgPool>,
    MaybeClaims(claims): MaybeClaims,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = claims.map(|c| c.sub);

    let query_str = format!("{CANDIDATE_SELECT} AND v.is_featured ORDER BY v.created_at DESC LIMIT 20");

    let rows = sqlx::query_as::<_, VideoFromDb>(&query_str)
        .bind(viewer_id)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch featured videos: {:?}", e);
            AppError::InternalServerError
        })?;

    let items: Vec<VideoResponse> = rows.into_iter().map(|r| r.into_response(None)).collect();

    Ok(ApiResponse::success(FeedResponse {
        items,
        next_cursor: None,
    }))
}

/// Watch-next suggestions for a video page: every public video except the
/// one playing, ranked with the same-category bonus active.
/// GET /api/videos/:id/next
pub async fn get_watch_next(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    MaybeClaims(claims): MaybeClaims,
    Path(video_id): Path<Uuid>,
    Query(filter): Query<FeedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = claims.map(|c| c.sub);

    let current = sqlx::query("SELECT category_id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Video not found".to_string()))?;
    let current_category: Option<Uuid> = current.get("category_id");

    let query_str = format!(
        "{CANDIDATE_SELECT} AND v.id <> $2 ORDER BY v.created_at DESC LIMIT {}",
        settings.feed_candidate_cap
    );

    let candidates = sqlx::query_as::<_, VideoFromDb>(&query_str)
        .bind(viewer_id)
        .bind(video_id)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch watch-next candidates: {:?}", e);
            AppError::InternalServerError
        })?;

    let viewer = build_viewer_context(&pool, viewer_id).await?;

    respond_ranked(
        candidates,
        &viewer,
        &FeedContext::WatchNext { current_category },
        &filter,
    )
}

/// Record (or repeat) a view. The first insert is what flips the viewer's
/// watched flag; repeats only grow the monotonic view total.
/// POST /api/videos/:id/view
pub async fn record_view(
    State(pool): State<PgPool>,
    claims: Claims,
    Path(video_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Video not found".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO video_views (video_id, channel_id, seen, created_at)
        VALUES ($1, $2, 1, NOW())
        ON CONFLICT (video_id, channel_id)
        DO UPDATE SET seen = video_views.seen + 1
        "#,
    )
    .bind(video_id)
    .bind(claims.sub)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("View recorded".to_string()))
}

/// Rate a video 1-5. One live rating per viewer and video: rating again
/// replaces, never accumulates.
/// POST /api/videos/:id/rating
pub async fn rate_video(
    State(pool): State<PgPool>,
    claims: Claims,
    Path(video_id): Path<Uuid>,
    Json(payload): Json<RateVideo>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    sqlx::query("SELECT id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Video not found".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO video_ratings (video_id, channel_id, rating, created_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (video_id, channel_id)
        DO UPDATE SET rating = EXCLUDED.rating, created_at = NOW()
        "#,
    )
    .bind(video_id)
    .bind(claims.sub)
    .bind(payload.rating)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Rating saved".to_string()))
}

/// Assembles the viewer-specific ranking inputs: followed channels and the
/// per-category view history behind the affinity term. Anonymous viewers get
/// the empty context.
async fn build_viewer_context(
    pool: &PgPool,
    viewer_id: Option<Uuid>,
) -> Result<ViewerContext, AppError> {
    let Some(viewer_id) = viewer_id else {
        return Ok(ViewerContext::anonymous());
    };

    let mut viewer = ViewerContext {
        viewer_id: Some(viewer_id),
        ..ViewerContext::anonymous()
    };

    let follows = sqlx::query("SELECT channel_id FROM channel_follows WHERE follower_id = $1")
        .bind(viewer_id)
        .fetch_all(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;
    for row in follows {
        viewer.followed_channels.insert(row.get("channel_id"));
    }

    let category_views = sqlx::query(
        r#"
        SELECT v.category_id, COUNT(*) AS views
        FROM video_views vv
        JOIN videos v ON v.id = vv.video_id
        WHERE vv.channel_id = $1 AND v.category_id IS NOT NULL
        GROUP BY v.category_id
        "#,
    )
    .bind(viewer_id)
    .fetch_all(pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;
    for row in category_views {
        viewer
            .category_views
            .insert(row.get("category_id"), row.get("views"));
    }

    Ok(viewer)
}

/// Ranks the candidate set and slices out the page after the caller's
/// (score, id) cursor.
fn respond_ranked(
    candidates: Vec<VideoFromDb>,
    viewer: &ViewerContext,
    context: &FeedContext,
    filter: &FeedFilter,
) -> Result<ApiResponse<FeedResponse>, AppError> {
    let limit = filter.limit.unwrap_or(20).clamp(1, 100) as usize;

    let mut rows: std::collections::HashMap<Uuid, VideoFromDb> = std::collections::HashMap::new();
    let mut signals = Vec::with_capacity(candidates.len());
    for row in candidates {
        signals.push(row.signals());
        rows.insert(row.id, row);
    }

    let ranked = rank_many(signals, viewer, context, chrono::Utc::now())?;

    let after_cursor: Vec<&RankedVideo> = match (filter.cursor_score, filter.cursor_id) {
        (Some(score), Some(id)) => ranked
            .iter()
            .filter(|r| r.score < score || (r.score == score && r.id < id))
            .collect(),
        _ => ranked.iter().collect(),
    };

    let has_more = after_cursor.len() > limit;
    let page = &after_cursor[..after_cursor.len().min(limit)];

    let next_cursor = if has_more {
        page.last().map(|last| FeedCursor {
            score: last.score,
            id: last.id,
        })
    } else {
        None
    };

    let items: Vec<VideoResponse> = page
        .iter()
        .filter_map(|r| rows.remove(&r.id).map(|row| row.into_response(Some(r.score))))
        .collect();

    Ok(ApiResponse::success(FeedResponse { items, next_cursor }))
}
