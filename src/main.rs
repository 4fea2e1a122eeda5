use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use booster_backend::{channels, comments, config::settings::Settings, videos, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    info!("database connected");

    let app_state = AppState {
        pool,
        settings: settings.clone(),
    };

    let feed_router = Router::new()
        .route("/", get(videos::handler::get_feed))
        .route("/featured", get(videos::handler::get_featured));

    let video_router = Router::new()
        .route("/:id/next", get(videos::handler::get_watch_next))
        .route("/:id/view", post(videos::handler::record_view))
        .route("/:id/rating", post(videos::handler::rate_video))
        .route(
            "/:id/comments",
            post(comments::handler::create_comment).get(comments::handler::get_video_comments),
        );

    let comment_router = Router::new()
        .route("/:id/replies", get(comments::handler::get_comment_replies))
        .route(
            "/:id/like",
            post(comments::handler::like_comment).delete(comments::handler::unlike_comment),
        );

    let channel_router = Router::new()
        .route("/:id", get(channels::handler::get_channel))
        .route(
            "/:id/follow",
            post(channels::handler::follow_channel).delete(channels::handler::unfollow_channel),
        );

    let app = Router::new()
        .route("/", get(|| async { "Booster API" }))
        .nest("/api/feed", feed_router)
        .nest("/api/videos", video_router)
        .nest("/api/comments", comment_router)
        .nest("/api/channels", channel_router)
        .with_state(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
