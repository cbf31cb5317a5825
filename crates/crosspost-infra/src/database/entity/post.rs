//! Post entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use crosspost_core::domain::{Post, PostContent};
use crosspost_core::error::RepoError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub media_urls: Json,
    pub status: String,
    pub scheduled_at: Option<DateTimeWithTimeZone>,
    pub published_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::target::Entity")]
    Target,
}

impl Related<super::target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Target.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Conversion from SeaORM Model to Domain Post.
impl TryFrom<Model> for Post {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let media_urls = serde_json::from_value(model.media_urls)
            .map_err(|e| RepoError::Query(format!("invalid media_urls: {e}")))?;

        Ok(Self {
            id: model.id,
            content: PostContent {
                message: model.content,
                media_urls,
            },
            status: model.status.parse()?,
            scheduled_at: model.scheduled_at.map(Into::into),
            published_at: model.published_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

/// Conversion from Domain Post to SeaORM ActiveModel.
impl From<Post> for ActiveModel {
    fn from(post: Post) -> Self {
        Self {
            id: Set(post.id),
            content: Set(post.content.message),
            media_urls: Set(Json::from(post.content.media_urls)),
            status: Set(post.status.as_str().to_string()),
            scheduled_at: Set(post.scheduled_at.map(Into::into)),
            published_at: Set(post.published_at.map(Into::into)),
            created_at: Set(post.created_at.into()),
            updated_at: Set(post.updated_at.into()),
        }
    }
}
