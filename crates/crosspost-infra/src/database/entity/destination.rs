//! Destination entity for SeaORM.
//!
//! Rows are maintained by the account-linking side of the product; the
//! publisher only reads them.

use sea_orm::entity::prelude::*;

use crosspost_core::domain::DestinationConnection;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "destinations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub platform: String,
    pub external_id: String,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub access_token: String,
    pub token_expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DestinationConnection {
    fn from(model: Model) -> Self {
        Self {
            destination_id: model.id,
            platform: model.platform,
            external_id: model.external_id,
            access_token: model.access_token,
            token_expires_at: model.token_expires_at.map(Into::into),
        }
    }
}
