//! PostgreSQL publish store.
//!
//! Claims and settlements are single conditional `UPDATE`s; the row count
//! tells whether the condition held. Aggregate refresh locks the post row
//! (`SELECT ... FOR UPDATE`) so concurrent refreshes serialize.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbConn, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crosspost_core::domain::{Lease, Post, PostStatus, Target, TargetOutcome, TargetStatus};
use crosspost_core::error::RepoError;
use crosspost_core::ports::{PostRepository, TargetRepository};

use super::entity::post::{self, Entity as PostEntity};
use super::entity::target::{self, Entity as TargetEntity};

/// PostgreSQL implementation of both repository ports.
#[derive(Clone)]
pub struct PostgresPublishStore {
    pub(crate) db: DbConn,
}

impl PostgresPublishStore {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    async fn find_target(&self, id: Uuid) -> Result<Target, RepoError> {
        TargetEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(query_err)?
            .ok_or(RepoError::NotFound)?
            .try_into()
    }
}

fn query_err(e: DbErr) -> RepoError {
    let err_str = e.to_string();
    if err_str.contains("duplicate") || err_str.contains("unique") {
        RepoError::Constraint("Entity already exists".to_string())
    } else if err_str.contains("foreign key") {
        RepoError::NotFound
    } else if matches!(e, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) {
        RepoError::Connection(err_str)
    } else {
        RepoError::Query(err_str)
    }
}

fn tz(at: DateTime<Utc>) -> DateTimeWithTimeZone {
    at.into()
}

fn null_uuid() -> SimpleExpr {
    Expr::value(Option::<Uuid>::None)
}

fn null_time() -> SimpleExpr {
    Expr::value(Option::<DateTimeWithTimeZone>::None)
}

fn null_text() -> SimpleExpr {
    Expr::value(Option::<String>::None)
}

/// Row is not published and has no remote id.
fn unpublished() -> Condition {
    Condition::all()
        .add(target::Column::RemoteId.is_null())
        .add(target::Column::Status.ne(TargetStatus::Published.as_str()))
}

/// Same rule as `Target::is_claimable`.
fn claimable(now: DateTime<Utc>) -> Condition {
    unpublished().add(
        Condition::any()
            .add(target::Column::LeaseExpiresAt.is_null())
            .add(target::Column::LeaseExpiresAt.lte(tz(now))),
    )
}

/// The lease identified by `token` is still live.
fn held(token: Uuid, now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(target::Column::LeaseToken.eq(token))
        .add(target::Column::LeaseExpiresAt.gt(tz(now)))
}

#[async_trait]
impl PostRepository for PostgresPublishStore {
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(query_err)?
            .map(Post::try_from)
            .transpose()
    }

    async fn create_post(&self, post: Post, targets: Vec<Target>) -> Result<Post, RepoError> {
        let txn = self.db.begin().await.map_err(query_err)?;

        let model = post::ActiveModel::from(post)
            .insert(&txn)
            .await
            .map_err(query_err)?;
        for target in targets {
            target::ActiveModel::from(target)
                .insert(&txn)
                .await
                .map_err(query_err)?;
        }

        txn.commit().await.map_err(query_err)?;
        tracing::debug!(post_id = %model.id, "Post created");
        model.try_into()
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Post, RepoError> {
        let result = PostEntity::update_many()
            .col_expr(post::Column::ScheduledAt, Expr::value(tz(scheduled_at)))
            .col_expr(post::Column::UpdatedAt, Expr::value(tz(Utc::now())))
            .filter(post::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(query_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }
        self.find_post(id).await?.ok_or(RepoError::NotFound)
    }

    async fn refresh_aggregate(&self, id: Uuid) -> Result<Post, RepoError> {
        let txn = self.db.begin().await.map_err(query_err)?;

        let model = PostEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(query_err)?
            .ok_or(RepoError::NotFound)?;
        let targets = TargetEntity::find()
            .filter(target::Column::PostId.eq(id))
            .order_by_asc(target::Column::CreatedAt)
            .all(&txn)
            .await
            .map_err(query_err)?
            .into_iter()
            .map(Target::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut post = Post::try_from(model)?;
        let before = post.clone();
        post.apply_aggregate(&targets, Utc::now());

        if post != before {
            post::ActiveModel::from(post.clone())
                .update(&txn)
                .await
                .map_err(query_err)?;
            tracing::debug!(post_id = %id, status = %post.status, "Aggregate status updated");
        }

        txn.commit().await.map_err(query_err)?;
        Ok(post)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Post>, RepoError> {
        PostEntity::find()
            .filter(post::Column::Status.eq(PostStatus::Scheduled.as_str()))
            .filter(post::Column::ScheduledAt.lte(tz(now)))
            .order_by_asc(post::Column::ScheduledAt)
            .all(&self.db)
            .await
            .map_err(query_err)?
            .into_iter()
            .map(Post::try_from)
            .collect()
    }
}

#[async_trait]
impl TargetRepository for PostgresPublishStore {
    async fn targets_for_post(&self, post_id: Uuid) -> Result<Vec<Target>, RepoError> {
        TargetEntity::find()
            .filter(target::Column::PostId.eq(post_id))
            .order_by_asc(target::Column::CreatedAt)
            .order_by_asc(target::Column::Id)
            .all(&self.db)
            .await
            .map_err(query_err)?
            .into_iter()
            .map(Target::try_from)
            .collect()
    }

    async fn insert_target(&self, target: Target) -> Result<Target, RepoError> {
        target::ActiveModel::from(target)
            .insert(&self.db)
            .await
            .map_err(query_err)?
            .try_into()
    }

    async fn claim(
        &self,
        target_id: Uuid,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<Option<Target>, RepoError> {
        let result = TargetEntity::update_many()
            .col_expr(
                target::Column::Status,
                Expr::value(TargetStatus::Dispatching.as_str()),
            )
            .col_expr(target::Column::LeaseToken, Expr::value(lease.token))
            .col_expr(
                target::Column::LeaseExpiresAt,
                Expr::value(tz(lease.expires_at)),
            )
            .col_expr(target::Column::UpdatedAt, Expr::value(tz(now)))
            .filter(target::Column::Id.eq(target_id))
            .filter(claimable(now))
            .exec(&self.db)
            .await
            .map_err(query_err)?;

        if result.rows_affected == 0 {
            tracing::debug!(target_id = %target_id, "Claim lost to another dispatch");
            return Ok(None);
        }
        self.find_target(target_id).await.map(Some)
    }

    async fn begin_attempt(
        &self,
        target_id: Uuid,
        token: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = TargetEntity::update_many()
            .col_expr(
                target::Column::AttemptCount,
                Expr::col(target::Column::AttemptCount).add(1),
            )
            .col_expr(target::Column::LastAttemptAt, Expr::value(tz(now)))
            .col_expr(target::Column::LeaseExpiresAt, Expr::value(tz(expires_at)))
            .col_expr(target::Column::UpdatedAt, Expr::value(tz(now)))
            .filter(target::Column::Id.eq(target_id))
            .filter(held(token, now))
            .filter(unpublished())
            .exec(&self.db)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected == 1)
    }

    async fn renew(
        &self,
        target_id: Uuid,
        token: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = TargetEntity::update_many()
            .col_expr(target::Column::LeaseExpiresAt, Expr::value(tz(expires_at)))
            .col_expr(target::Column::UpdatedAt, Expr::value(tz(now)))
            .filter(target::Column::Id.eq(target_id))
            .filter(target::Column::LeaseToken.eq(token))
            .filter(unpublished())
            .exec(&self.db)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected == 1)
    }

    async fn settle(
        &self,
        target_id: Uuid,
        token: Uuid,
        outcome: TargetOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let update = TargetEntity::update_many()
            .col_expr(target::Column::LeaseToken, null_uuid())
            .col_expr(target::Column::LeaseExpiresAt, null_time())
            .col_expr(target::Column::UpdatedAt, Expr::value(tz(now)))
            .filter(target::Column::Id.eq(target_id))
            .filter(unpublished());

        // A success is kept even if the lease lapsed, as long as no one else
        // took the row over (see `Target::settle`).
        let update = match outcome {
            TargetOutcome::Published { remote_id } => update
                .col_expr(
                    target::Column::Status,
                    Expr::value(TargetStatus::Published.as_str()),
                )
                .col_expr(target::Column::RemoteId, Expr::value(remote_id))
                .col_expr(target::Column::PublishedAt, Expr::value(tz(now)))
                .col_expr(target::Column::ErrorKind, null_text())
                .col_expr(target::Column::ErrorMessage, null_text())
                .filter(target::Column::LeaseToken.eq(token)),
            TargetOutcome::Failed { kind, message } => update
                .col_expr(
                    target::Column::Status,
                    Expr::value(TargetStatus::Failed.as_str()),
                )
                .col_expr(target::Column::ErrorKind, Expr::value(kind.as_str()))
                .col_expr(target::Column::ErrorMessage, Expr::value(message))
                .filter(held(token, now)),
        };

        let result = update.exec(&self.db).await.map_err(query_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn release(
        &self,
        target_id: Uuid,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = TargetEntity::update_many()
            .col_expr(
                target::Column::Status,
                Expr::value(TargetStatus::Pending.as_str()),
            )
            .col_expr(target::Column::LeaseToken, null_uuid())
            .col_expr(target::Column::LeaseExpiresAt, null_time())
            .col_expr(target::Column::UpdatedAt, Expr::value(tz(now)))
            .filter(target::Column::Id.eq(target_id))
            .filter(target::Column::LeaseToken.eq(token))
            .filter(unpublished())
            .exec(&self.db)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected == 1)
    }

    async fn force_fail(
        &self,
        target_id: Uuid,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let result = TargetEntity::update_many()
            .col_expr(
                target::Column::Status,
                Expr::value(TargetStatus::Failed.as_str()),
            )
            .col_expr(
                target::Column::ErrorKind,
                Expr::value(crosspost_core::PublishErrorKind::Rejected.as_str()),
            )
            .col_expr(target::Column::ErrorMessage, Expr::value(message))
            .col_expr(target::Column::LeaseToken, null_uuid())
            .col_expr(target::Column::LeaseExpiresAt, null_time())
            .col_expr(target::Column::UpdatedAt, Expr::value(tz(now)))
            .filter(target::Column::Id.eq(target_id))
            .filter(claimable(now))
            .filter(target::Column::Status.ne(TargetStatus::Failed.as_str()))
            .exec(&self.db)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected == 1)
    }
}
