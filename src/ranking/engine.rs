//! The feed relevance score. Engagement signals are compressed through a
//! logarithm so that raw view counts cannot drown out everything else, then
//! viewer-relative terms (recency, watched, follow, category affinity) are
//! added linearly on top.

use chrono::{DateTime, Utc};

use crate::leveling::boost_term;

use super::{FeedContext, RankedVideo, ValidationError, VideoSignals, ViewerContext};

const RECENCY_WEIGHT: f64 = 100.0;
const WATCHED_PENALTY: f64 = 100.0;
const FOLLOW_BONUS: f64 = 50.0;
const CATEGORY_AFFINITY_WEIGHT: f64 = 20.0;
const SAME_CATEGORY_BONUS: f64 = 50.0;

/// Floor under the ln argument. The engagement core can only go non-positive
/// when a zero-boost channel with zero views draws a strongly negative
/// rating term, but ln must stay defined there.
const ENGAGEMENT_FLOOR: f64 = 1e-6;

fn ln_count(count: i64) -> f64 {
    (count.max(1) as f64).ln()
}

/// Hours elapsed since upload, clamped at zero so clock skew cannot push the
/// recency logarithm out of its domain.
fn hours_since_upload(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - created_at).num_milliseconds() as f64 / 3_600_000.0;
    hours.max(0.0)
}

/// Composite relevance score for one candidate. Pure; inputs are assumed to
/// have passed [`VideoSignals::validate`].
pub fn score(
    video: &VideoSignals,
    viewer: &ViewerContext,
    context: &FeedContext,
    now: DateTime<Utc>,
) -> f64 {
    let boost = boost_term(video.boost_points as u64);

    let engagement_core = (boost + 1.0).powi(2)
        + video.views as f64
        + (video.average_rating - 3.5).tanh() * ln_count(video.ratings_count)
        + ln_count(video.ratings_count)
        + ln_count(video.comments_count)
        + boost;

    let base_score = engagement_core.max(ENGAGEMENT_FLOOR).ln();

    let recency_bonus = RECENCY_WEIGHT / (hours_since_upload(video.created_at, now) + 2.0).ln();

    let watched_penalty = if video.is_watched { WATCHED_PENALTY } else { 0.0 };

    let follow_bonus = if viewer.is_following(video.channel_id) {
        FOLLOW_BONUS
    } else {
        0.0
    };

    let category_affinity = CATEGORY_AFFINITY_WEIGHT
        * ((viewer.category_view_count(video.category_id) as f64) + 1.0).ln();

    let same_category_bonus = match context {
        FeedContext::WatchNext { current_category } => {
            let same = current_category.is_some() && *current_category == video.category_id;
            if same {
                SAME_CATEGORY_BONUS
            } else {
                0.0
            }
        }
        FeedContext::Explorer => 0.0,
    };

    base_score + recency_bonus - watched_penalty + follow_bonus + category_affinity
        + same_category_bonus
}

/// Scores every candidate and returns them best-first. Validation happens up
/// front for the whole set. Ties keep the candidates' incoming order (the
/// sort is stable).
pub fn rank_many(
    videos: Vec<VideoSignals>,
    viewer: &ViewerContext,
    context: &FeedContext,
    now: DateTime<Utc>,
) -> Result<Vec<RankedVideo>, ValidationError> {
    for video in &videos {
        video.validate()?;
    }

    let mut ranked: Vec<RankedVideo> = videos
        .into_iter()
        .map(|signals| {
            let score = score(&signals, viewer, context, now);
            RankedVideo {
                id: signals.id,
                signals,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;

    fn sample_video() -> VideoSignals {
        VideoSignals {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            boost_points: 4000,
            created_at: Utc::now(),
            views: 1000,
            average_rating: 4.2,
            ratings_count: 50,
            comments_count: 10,
            category_id: None,
            is_watched: false,
            is_featured: false,
        }
    }

    #[test]
    fn score_is_deterministic() {
        let video = sample_video();
        let viewer = ViewerContext::anonymous();
        let now = Utc::now();

        let a = score(&video, &viewer, &FeedContext::Explorer, now);
        let b = score(&video, &viewer, &FeedContext::Explorer, now);
        assert_eq!(a, b);
    }

    #[test]
    fn anonymous_two_hour_old_video_scores_as_computed_by_hand() {
        let now = Utc::now();
        let mut video = sample_video();
        video.created_at = now - Duration::hours(2);

        let got = score(&video, &ViewerContext::anonymous(), &FeedContext::Explorer, now);

        // boost = sqrt(4000 * 1000) / 1000 = 2
        let boost = 2.0_f64;
        let core = (boost + 1.0).powi(2)
            + 1000.0
            + (4.2_f64 - 3.5).tanh() * 50.0_f64.ln()
            + 50.0_f64.ln()
            + 10.0_f64.ln()
            + boost;
        let expected = core.ln() + 100.0 / 4.0_f64.ln();

        assert!((got - expected).abs() < 1e-9, "got {got}, expected {expected}");
    }

    #[test]
    fn more_views_never_lowers_the_score() {
        let now = Utc::now();
        let viewer = ViewerContext::anonymous();
        let mut video = sample_video();

        let mut last = f64::NEG_INFINITY;
        for views in [0, 1, 10, 100, 1000, 100_000, 10_000_000] {
            video.views = views;
            let s = score(&video, &viewer, &FeedContext::Explorer, now);
            assert!(s >= last, "score dropped at {views} views");
            last = s;
        }
    }

    #[test]
    fn watched_video_scores_exactly_one_hundred_less() {
        let now = Utc::now();
        let viewer = ViewerContext::anonymous();
        let fresh = sample_video();
        let mut watched = fresh.clone();
        watched.is_watched = true;

        let delta = score(&fresh, &viewer, &FeedContext::Explorer, now)
            - score(&watched, &viewer, &FeedContext::Explorer, now);
        assert_eq!(delta, 100.0);
    }

    #[test]
    fn followed_author_scores_exactly_fifty_more() {
        let now = Utc::now();
        let video = sample_video();

        let mut follower = ViewerContext::anonymous();
        follower.followed_channels.insert(video.channel_id);

        let delta = score(&video, &follower, &FeedContext::Explorer, now)
            - score(&video, &ViewerContext::anonymous(), &FeedContext::Explorer, now);
        assert_eq!(delta, 50.0);
    }

    #[test]
    fn same_category_bonus_applies_only_on_watch_next() {
        let now = Utc::now();
        let viewer = ViewerContext::anonymous();
        let category = Some(Uuid::new_v4());
        let mut video = sample_video();
        video.category_id = category;

        let explorer = score(&video, &viewer, &FeedContext::Explorer, now);
        let watch_next = score(
            &video,
            &viewer,
            &FeedContext::WatchNext {
                current_category: category,
            },
            now,
        );
        let unrelated = score(
            &video,
            &viewer,
            &FeedContext::WatchNext {
                current_category: Some(Uuid::new_v4()),
            },
            now,
        );

        assert_eq!(watch_next - explorer, 50.0);
        assert_eq!(unrelated, explorer);
    }

    #[test]
    fn category_affinity_rewards_viewer_history() {
        let now = Utc::now();
        let category = Uuid::new_v4();
        let mut video = sample_video();
        video.category_id = Some(category);

        let mut fan = ViewerContext::anonymous();
        fan.category_views.insert(category, 100);

        let delta = score(&video, &fan, &FeedContext::Explorer, now)
            - score(&video, &ViewerContext::anonymous(), &FeedContext::Explorer, now);
        let expected = 20.0 * 101.0_f64.ln();
        assert!((delta - expected).abs() < 1e-9);
    }

    #[test]
    fn worst_case_engagement_core_stays_finite() {
        // Zero boost, zero views, terrible ratings: the tanh term is the only
        // negative contribution and the floor keeps ln defined.
        let now = Utc::now();
        let mut video = sample_video();
        video.boost_points = 0;
        video.views = 0;
        video.average_rating = 0.0;
        video.ratings_count = 1_000_000;
        video.comments_count = 0;

        let s = score(&video, &ViewerContext::anonymous(), &FeedContext::Explorer, now);
        assert!(s.is_finite());
    }

    #[test]
    fn negative_counts_are_rejected_before_scoring() {
        let mut video = sample_video();
        video.views = -1;
        assert!(matches!(
            video.validate(),
            Err(ValidationError::NegativeCount { field: "views", .. })
        ));

        let mut video = sample_video();
        video.average_rating = f64::NAN;
        assert!(matches!(
            video.validate(),
            Err(ValidationError::RatingOutOfRange { .. })
        ));
    }

    #[test]
    fn rank_many_orders_best_first_and_keeps_tied_order() {
        let now = Utc::now();
        let viewer = ViewerContext::anonymous();

        let mut strong = sample_video();
        strong.views = 1_000_000;
        let weak = {
            let mut v = sample_video();
            v.views = 1;
            v
        };
        let tied_a = sample_video();
        let mut tied_b = tied_a.clone();
        tied_b.id = Uuid::new_v4();

        let ranked = rank_many(
            vec![weak.clone(), tied_a.clone(), strong.clone(), tied_b.clone()],
            &viewer,
            &FeedContext::Explorer,
            now,
        )
        .unwrap();

        assert_eq!(ranked[0].id, strong.id);
        assert_eq!(ranked[3].id, weak.id);
        // Equal scores keep candidate order.
        assert_eq!(ranked[1].id, tied_a.id);
        assert_eq!(ranked[2].id, tied_b.id);
    }

    #[test]
    fn rank_many_surfaces_validation_errors() {
        let mut bad = sample_video();
        bad.comments_count = -5;

        let err = rank_many(
            vec![sample_video(), bad],
            &ViewerContext::anonymous(),
            &FeedContext::Explorer,
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::NegativeCount { .. }));
    }

    #[test]
    fn future_upload_timestamp_is_clamped() {
        let now = Utc::now();
        let mut video = sample_video();
        video.created_at = now + Duration::hours(5);

        let skewed = score(&video, &ViewerContext::anonymous(), &FeedContext::Explorer, now);
        video.created_at = now;
        let fresh = score(&video, &ViewerContext::anonymous(), &FeedContext::Explorer, now);

        assert_eq!(skewed, fresh);
    }
}
