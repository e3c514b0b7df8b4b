//! Rate limiting against the shared database bucket store.

mod test_utils;

use std::sync::Arc;

use anyhow::Result;
use leasegate::config::{FailureMode, RateLimitConfig, RateLimitRule};
use leasegate::error::CoreError;
use leasegate::models::RateLimitBucket;
use leasegate::rate_limit::{RateLimitedEndpoint, RateLimiter};
use leasegate::repositories::SeaOrmBucketStore;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Statement};
use test_utils::setup_test_db;

const WINDOW_MS: i64 = 60_000;

fn limiter(db: &DatabaseConnection, capacity: u32) -> RateLimiter {
    let rules = RateLimitConfig {
        invite_validation: RateLimitRule::new(capacity, 60, FailureMode::FailClosed),
        api: RateLimitRule::new(capacity, 60, FailureMode::FailOpen),
        ..Default::default()
    };
    RateLimiter::new(Arc::new(SeaOrmBucketStore::new(db.clone())), rules)
}

#[tokio::test]
async fn n_plus_first_call_is_limited_until_the_window_elapses() -> Result<()> {
    let db = setup_test_db().await?;
    let limiter = limiter(&db, 5);
    let start = 1_700_000_000_000;
    let key = "client:203.0.113.7";

    for expected_remaining in (0..5).rev() {
        let decision = limiter
            .check_at(RateLimitedEndpoint::InviteValidation, key, start)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected_remaining);
    }

    let denied = limiter
        .check_at(RateLimitedEndpoint::InviteValidation, key, start + 30_000)
        .await;
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
    assert_eq!(denied.retry_after_secs, Some(30));

    // Just before the window closes: still limited.
    let still = limiter
        .check_at(RateLimitedEndpoint::InviteValidation, key, start + WINDOW_MS - 1)
        .await;
    assert!(!still.allowed);

    let reset = limiter
        .check_at(RateLimitedEndpoint::InviteValidation, key, start + WINDOW_MS + 1)
        .await;
    assert!(reset.allowed);
    assert_eq!(reset.remaining, 4);
    Ok(())
}

#[tokio::test]
async fn buckets_are_keyed_by_endpoint_and_caller() -> Result<()> {
    let db = setup_test_db().await?;
    let limiter = limiter(&db, 1);
    let now = 1_700_000_000_000;

    assert!(limiter.check_at(RateLimitedEndpoint::InviteValidation, "client:a", now).await.allowed);
    assert!(!limiter.check_at(RateLimitedEndpoint::InviteValidation, "client:a", now).await.allowed);

    assert!(limiter.check_at(RateLimitedEndpoint::InviteValidation, "client:b", now).await.allowed);
    assert!(limiter.check_at(RateLimitedEndpoint::Api, "client:a", now).await.allowed);

    let buckets = RateLimitBucket::find().all(&db).await?;
    assert_eq!(buckets.len(), 3);
    Ok(())
}

#[tokio::test]
async fn instances_sharing_the_database_share_buckets() -> Result<()> {
    let db = setup_test_db().await?;
    let first = limiter(&db, 2);
    let second = limiter(&db, 2);
    let now = 1_700_000_000_000;

    assert!(first.check_at(RateLimitedEndpoint::InviteValidation, "client:a", now).await.allowed);
    assert!(second.check_at(RateLimitedEndpoint::InviteValidation, "client:a", now).await.allowed);
    assert!(!first.check_at(RateLimitedEndpoint::InviteValidation, "client:a", now).await.allowed);
    assert!(!second.check_at(RateLimitedEndpoint::InviteValidation, "client:a", now).await.allowed);
    Ok(())
}

#[tokio::test]
async fn store_failure_follows_the_endpoint_failure_mode() -> Result<()> {
    let db = setup_test_db().await?;
    let limiter = limiter(&db, 5);
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE rate_limit_buckets".to_string(),
    ))
    .await?;

    let closed = limiter
        .check(RateLimitedEndpoint::InviteValidation, "client:a")
        .await;
    assert!(!closed.allowed, "invite validation fails closed");
    assert!(closed.retry_after_secs.is_some());

    let open = limiter.check(RateLimitedEndpoint::Api, "subject:user-1").await;
    assert!(open.allowed, "general API traffic fails open");

    let err = limiter
        .enforce(RateLimitedEndpoint::InviteValidation, "client:a")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RateLimited { retry_after_secs } if retry_after_secs >= 1));
    Ok(())
}
