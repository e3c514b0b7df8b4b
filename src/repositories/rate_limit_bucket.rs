//! # Rate Limit Bucket Store
//!
//! SeaORM implementation of [`BucketStore`]. Each method is one conditional
//! statement, so concurrent instances sharing the database never lose or
//! double-spend a token.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::RateLimitBucket;
use crate::models::rate_limit_bucket::{self, ActiveModel as BucketActiveModel};
use crate::rate_limit::BucketStore;

#[derive(Clone)]
pub struct SeaOrmBucketStore {
    db: DatabaseConnection,
}

impl SeaOrmBucketStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BucketStore for SeaOrmBucketStore {
    async fn consume(&self, endpoint: &str, caller_key: &str, now_ms: i64) -> Result<bool, RepositoryError> {
        let result = RateLimitBucket::update_many()
            .col_expr(
                rate_limit_bucket::Column::TokensRemaining,
                Expr::col(rate_limit_bucket::Column::TokensRemaining).sub(1),
            )
            .filter(rate_limit_bucket::Column::Endpoint.eq(endpoint))
            .filter(rate_limit_bucket::Column::CallerKey.eq(caller_key))
            .filter(rate_limit_bucket::Column::WindowResetsAtMs.gt(now_ms))
            .filter(rate_limit_bucket::Column::TokensRemaining.gt(0))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn reset_window(
        &self,
        endpoint: &str,
        caller_key: &str,
        tokens_after: i32,
        resets_at_ms: i64,
        now_ms: i64,
    ) -> Result<bool, RepositoryError> {
        let result = RateLimitBucket::update_many()
            .col_expr(rate_limit_bucket::Column::TokensRemaining, Expr::value(tokens_after))
            .col_expr(rate_limit_bucket::Column::WindowResetsAtMs, Expr::value(resets_at_ms))
            .filter(rate_limit_bucket::Column::Endpoint.eq(endpoint))
            .filter(rate_limit_bucket::Column::CallerKey.eq(caller_key))
            .filter(rate_limit_bucket::Column::WindowResetsAtMs.lte(now_ms))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn insert_bucket(
        &self,
        endpoint: &str,
        caller_key: &str,
        tokens_after: i32,
        resets_at_ms: i64,
    ) -> Result<bool, RepositoryError> {
        let bucket = BucketActiveModel {
            endpoint: Set(endpoint.to_string()),
            caller_key: Set(caller_key.to_string()),
            tokens_remaining: Set(tokens_after),
            window_resets_at_ms: Set(resets_at_ms),
        };

        match RateLimitBucket::insert(bucket)
            .exec_without_returning(&self.db)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(RepositoryError::database_error(err)),
        }
    }

    async fn snapshot(&self, endpoint: &str, caller_key: &str) -> Result<Option<(i32, i64)>, RepositoryError> {
        let bucket = RateLimitBucket::find_by_id((endpoint.to_string(), caller_key.to_string()))
            .one(&self.db)
            .await?;
        Ok(bucket.map(|b| (b.tokens_remaining, b.window_resets_at_ms)))
    }
}
