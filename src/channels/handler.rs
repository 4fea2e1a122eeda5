use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    auth::jwt::{Claims, MaybeClaims},
    channels::{ChannelProfile, FollowActionResponse},
    error::AppError,
    leveling::compute_level,
    response::ApiResponse,
};

/// Get a channel's public profile with follow stats and level progression.
/// GET /api/channels/:id
pub async fn get_channel(
    State(pool): State<PgPool>,
    MaybeClaims(claims): MaybeClaims,
    Path(channel_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = claims.map(|c| c.sub);

    let row = sqlx::query(
        r#"
        SELECT
            ch.id, ch.name, ch.image_url, ch.boost_points, ch.created_at,
            (SELECT COUNT(*) FROM channel_follows cf WHERE cf.channel_id = ch.id) AS followers_count,
            (SELECT COUNT(*) FROM videos v WHERE v.channel_id = ch.id) AS video_count,
            EXISTS (
                SELECT 1 FROM channel_follows cf2
                WHERE cf2.channel_id = ch.id AND cf2.follower_id = $2
            ) AS viewer_is_following
        FROM channels ch
        WHERE ch.id = $1
        "#,
    )
    .bind(channel_id)
    .bind(viewer_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch channel: {:?}", e);
        AppError::InternalServerError
    })?
    .ok_or(AppError::NotFound("Channel not found".to_string()))?;

    let boost_points: i64 = row.get("boost_points");

    let profile = ChannelProfile {
        id: row.get("id"),
        name: row.get("name"),
        image_url: row.get("image_url"),
        boost_points,
        level: compute_level(boost_points.max(0) as u64),
        followers_count: row.get("followers_count"),
        video_count: row.get("video_count"),
        viewer_is_following: row.get("viewer_is_following"),
        created_at: row.get("created_at"),
    };

    Ok(ApiResponse::success(profile))
}

/// Follow a channel. Following twice is a no-op.
/// POST /api/channels/:id/follow
pub async fn follow_channel(
    State(pool): State<PgPool>,
    claims: Claims,
    Path(channel_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if channel_id == claims.sub {
        return Err(AppError::UnprocessableEntity(
            "Cannot follow yourself".to_string(),
        ));
    }

    sqlx::query("SELECT id FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Channel not found".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO channel_follows (follower_id, channel_id, created_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (follower_id, channel_id) DO NOTHING
        "#,
    )
    .bind(claims.sub)
    .bind(channel_id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let followers_count = count_followers(&pool, channel_id).await?;

    Ok(ApiResponse::success(FollowActionResponse {
        following: true,
        followers_count,
    }))
}

/// Unfollow a channel. Unfollowing a channel you do not follow is a no-op.
/// DELETE /api/channels/:id/follow
pub async fn unfollow_channel(
    State(pool): State<PgPool>,
    claims: Claims,
    Path(channel_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("DELETE FROM channel_follows WHERE follower_id = $1 AND channel_id = $2")
        .bind(claims.sub)
        .bind(channel_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    let followers_count = count_followers(&pool, channel_id).await?;

    Ok(ApiResponse::success(FollowActionResponse {
        following: false,
        followers_count,
    }))
}

async fn count_followers(pool: &PgPool, channel_id: Uuid) -> Result<i64, AppError> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM channel_follows WHERE channel_id = $1")
        .bind(channel_id)
        .fetch_one(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;
    Ok(row.get("count"))
}
