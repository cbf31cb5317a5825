//! Target entity for SeaORM.
//!
//! The `(post_id, destination_id)` pair carries a unique index; the lease
//! columns implement the dispatch claim.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use crosspost_core::domain::{Lease, Target};
use crosspost_core::error::{PublishErrorKind, RepoError};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "targets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub post_id: Uuid,
    pub destination_id: Uuid,
    pub status: String,
    pub remote_id: Option<String>,
    pub error_kind: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub last_attempt_at: Option<DateTimeWithTimeZone>,
    pub published_at: Option<DateTimeWithTimeZone>,
    pub lease_token: Option<Uuid>,
    pub lease_expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Post,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Conversion from SeaORM Model to Domain Target.
impl TryFrom<Model> for Target {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let lease = match (model.lease_token, model.lease_expires_at) {
            (Some(token), Some(expires_at)) => Some(Lease {
                token,
                expires_at: expires_at.into(),
            }),
            _ => None,
        };

        Ok(Self {
            id: model.id,
            post_id: model.post_id,
            destination_id: model.destination_id,
            status: model.status.parse()?,
            remote_id: model.remote_id,
            error_kind: model
                .error_kind
                .map(|k| k.parse::<PublishErrorKind>())
                .transpose()?,
            error_message: model.error_message,
            attempt_count: u32::try_from(model.attempt_count).unwrap_or_default(),
            last_attempt_at: model.last_attempt_at.map(Into::into),
            published_at: model.published_at.map(Into::into),
            lease,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

/// Conversion from Domain Target to SeaORM ActiveModel.
impl From<Target> for ActiveModel {
    fn from(target: Target) -> Self {
        Self {
            id: Set(target.id),
            post_id: Set(target.post_id),
            destination_id: Set(target.destination_id),
            status: Set(target.status.as_str().to_string()),
            remote_id: Set(target.remote_id),
            error_kind: Set(target.error_kind.map(|k| k.as_str().to_string())),
            error_message: Set(target.error_message),
            attempt_count: Set(i32::try_from(target.attempt_count).unwrap_or(i32::MAX)),
            last_attempt_at: Set(target.last_attempt_at.map(Into::into)),
            published_at: Set(target.published_at.map(Into::into)),
            lease_token: Set(target.lease.map(|l| l.token)),
            lease_expires_at: Set(target.lease.map(|l| l.expires_at.into())),
            created_at: Set(target.created_at.into()),
            updated_at: Set(target.updated_at.into()),
        }
    }
}
