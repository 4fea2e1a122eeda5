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
    comments::{
        Comment, CommentAuthor, CommentCursor, CommentPage, CommentPageFilter, CommentView,
        CreateComment,
    },
    error::AppError,
    response::ApiResponse,
};

/// Helper struct for fetching comments with author info from database
#[derive(FromRow)]
struct CommentFromDb {
    id: Uuid,
    video_id: Uuid,
    author_id: Uuid,
    parent_id: Option<Uuid>,
    body: String,
    created_at: chrono::DateTime<chrono::Utc>,
    // Author fields
    author_name: String,
    author_image_url: Option<String>,
    // Aggregates
    like_count: i64,
    viewer_liked: bool,
    reply_count: i64,
}

impl From<CommentFromDb> for CommentView {
    fn from(c: CommentFromDb) -> Self {
        CommentView {
            id: c.id,
            video_id: c.video_id,
            parent_id: c.parent_id,
            author: CommentAuthor {
                id: c.author_id,
                name: c.author_name,
                image_url: c.author_image_url,
            },
            body: c.body,
            like_count: c.like_count,
            viewer_liked: c.viewer_liked,
            reply_count: c.reply_count,
            created_at: c.created_at,
        }
    }
}

const COMMENT_SELECT: &str = r#"
    SELECT
        c.id, c.video_id, c.author_id, c.parent_id, c.body, c.created_at,
        ch.name AS author_name, ch.image_url AS author_image_url,
        (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS like_count,
        EXISTS (
            SELECT 1 FROM comment_likes cl2
            WHERE cl2.comment_id = c.id AND cl2.channel_id = $1
        ) AS viewer_liked,
        (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id) AS reply_count
    FROM comments c
    JOIN channels ch ON c.author_id = ch.id
"#;

/// Create a new comment or reply on a video
/// POST /api/videos/:id/comments
pub async fn create_comment(
    State(pool): State<PgPool>,
    claims: Claims,
    Path(video_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    // Verify video exists and is visible
    sqlx::query("SELECT id FROM videos WHERE id = $1 AND visibility = 'public'")
        .bind(video_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Video not found".to_string()))?;

    // If replying, verify the parent exists and belongs to the same video
    if let Some(parent_id) = payload.parent_id {
        let parent = sqlx::query("SELECT video_id FROM comments WHERE id = $1")
            .bind(parent_id)
            .fetch_optional(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;

        let parent_video_id: Uuid = parent.get("video_id");
        if parent_video_id != video_id {
            return Err(AppError::UnprocessableEntity(
                "Parent comment does not belong to this video".to_string(),
            ));
        }
    }

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (video_id, author_id, parent_id, body, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING *
        "#,
    )
    .bind(video_id)
    .bind(claims.sub)
    .bind(payload.parent_id)
    .bind(&payload.body)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError
    })?;

    let view = fetch_comment_view(&pool, comment.id, Some(claims.sub)).await?;
    Ok(ApiResponse::success(view).created())
}

/// Get top-level comments for a video, newest first, keyset-paginated.
/// The first page (no cursor) also carries the video's total comment count.
/// GET /api/videos/:id/comments
pub async fn get_video_comments(
    State(pool): State<PgPool>,
    MaybeClaims(claims): MaybeClaims,
    Path(video_id): Path<Uuid>,
    Query(filter): Query<CommentPageFilter>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM videos WHERE id = $1")
        .bind(video_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Video not found".to_string()))?;

    let viewer_id = claims.map(|c| c.sub);
    let cursor = filter.cursor();

    let comment_count = if cursor.is_none() {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM comments WHERE video_id = $1")
            .bind(video_id)
            .fetch_one(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?;
        Some(row.get::<i64, _>("count"))
    } else {
        None
    };

    let page = fetch_page(
        &pool,
        viewer_id,
        "c.video_id = $2 AND c.parent_id IS NULL",
        video_id,
        cursor,
        filter.limit,
        comment_count,
    )
    .await?;

    Ok(ApiResponse::success(page))
}

/// Get replies to a specific comment, newest first.
/// GET /api/comments/:id/replies
pub async fn get_comment_replies(
    State(pool): State<PgPool>,
    MaybeClaims(claims): MaybeClaims,
    Path(comment_id): Path<Uuid>,
    Query(filter): Query<CommentPageFilter>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    let viewer_id = claims.map(|c| c.sub);

    let page = fetch_page(
        &pool,
        viewer_id,
        "c.parent_id = $2",
        comment_id,
        filter.cursor(),
        filter.limit,
        None,
    )
    .await?;

    Ok(ApiResponse::success(page))
}

/// Like a comment. Inserting twice is a no-op, so the endpoint is safe to
/// retry.
/// POST /api/comments/:id/like
pub async fn like_comment(
    State(pool): State<PgPool>,
    claims: Claims,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO comment_likes (comment_id, channel_id, created_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (comment_id, channel_id) DO NOTHING
        "#,
    )
    .bind(comment_id)
    .bind(claims.sub)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Comment liked".to_string()))
}

/// Remove a like from a comment. Deleting a missing like is a no-op.
/// DELETE /api/comments/:id/like
pub async fn unlike_comment(
    State(pool): State<PgPool>,
    claims: Claims,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND channel_id = $2")
        .bind(comment_id)
        .bind(claims.sub)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    Ok(ApiResponse::ok("Comment unliked".to_string()))
}

/// Shared keyset-pagination query for both list shapes. `scope` filters on
/// either the video (top-level) or the parent comment (replies); `scope_id`
/// binds into it as $2.
async fn fetch_page(
    pool: &PgPool,
    viewer_id: Option<Uuid>,
    scope: &str,
    scope_id: Uuid,
    cursor: Option<CommentCursor>,
    limit: Option<i64>,
    comment_count: Option<i64>,
) -> Result<CommentPage, AppError> {
    let limit = limit.unwrap_or(20).clamp(1, 100);

    let cursor_clause = if cursor.is_some() {
        "AND (c.created_at < $3 OR (c.created_at = $3 AND c.id < $4))"
    } else {
        ""
    };

    let query_str = format!(
        r#"
        {COMMENT_SELECT}
        WHERE {scope} {cursor_clause}
        ORDER BY c.created_at DESC, c.id DESC
        LIMIT {}
        "#,
        limit + 1
    );

    let mut query = sqlx::query_as::<_, CommentFromDb>(&query_str)
        .bind(viewer_id)
        .bind(scope_id);
    if let Some(cursor) = cursor {
        query = query.bind(cursor.created_at).bind(cursor.id);
    }

    let mut rows = query.fetch_all(pool).await.map_err(|e| {
        tracing::error!("Failed to fetch comments: {:?}", e);
        AppError::InternalServerError
    })?;

    let has_more = rows.len() as i64 > limit;
    if has_more {
        rows.truncate(limit as usize);
    }

    let comments: Vec<CommentView> = rows.into_iter().map(CommentView::from).collect();
    let next_cursor = if has_more {
        comments.last().map(|last| CommentCursor {
            created_at: last.created_at,
            id: last.id,
        })
    } else {
        None
    };

    Ok(CommentPage {
        comments,
        next_cursor,
        comment_count,
    })
}

/// Helper to fetch a single comment with full details
async fn fetch_comment_view(
    pool: &PgPool,
    comment_id: Uuid,
    viewer_id: Option<Uuid>,
) -> Result<CommentView, AppError> {
    let query_str = format!("{COMMENT_SELECT} WHERE c.id = $2");

    let comment = sqlx::query_as::<_, CommentFromDb>(&query_str)
        .bind(viewer_id)
        .bind(comment_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch comment: {:?}", e);
            AppError::InternalServerError
        })?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    Ok(CommentView::from(comment))
}
