//! Destination directories - where connection details come from.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crosspost_core::domain::DestinationConnection;
use crosspost_core::error::RepoError;
use crosspost_core::ports::DestinationDirectory;

/// In-memory directory, filled by the caller.
#[derive(Default)]
pub struct InMemoryDestinationDirectory {
    entries: RwLock<HashMap<Uuid, DestinationConnection>>,
}

impl InMemoryDestinationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, connection: DestinationConnection) {
        self.entries
            .write()
            .await
            .insert(connection.destination_id, connection);
    }

    pub async fn remove(&self, destination_id: Uuid) -> Option<DestinationConnection> {
        self.entries.write().await.remove(&destination_id)
    }
}

#[async_trait]
impl DestinationDirectory for InMemoryDestinationDirectory {
    async fn lookup(
        &self,
        destination_id: Uuid,
    ) -> Result<Option<DestinationConnection>, RepoError> {
        Ok(self.entries.read().await.get(&destination_id).cloned())
    }
}

#[cfg(feature = "postgres")]
pub use postgres::PostgresDestinationDirectory;

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use sea_orm::{DbConn, EntityTrait};

    use crate::database::entity::destination::Entity as DestinationEntity;

    /// Reads the `destinations` table.
    #[derive(Clone)]
    pub struct PostgresDestinationDirectory {
        db: DbConn,
    }

    impl PostgresDestinationDirectory {
        pub fn new(db: DbConn) -> Self {
            Self { db }
        }
    }

    #[async_trait]
    impl DestinationDirectory for PostgresDestinationDirectory {
        async fn lookup(
            &self,
            destination_id: Uuid,
        ) -> Result<Option<DestinationConnection>, RepoError> {
            let model = DestinationEntity::find_by_id(destination_id)
                .one(&self.db)
                .await
                .map_err(|e| RepoError::Query(e.to_string()))?;
            Ok(model.map(Into::into))
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let directory = InMemoryDestinationDirectory::new();
        let conn = DestinationConnection {
            destination_id: Uuid::new_v4(),
            platform: "graph".into(),
            external_id: "page-1".into(),
            access_token: "t".into(),
            token_expires_at: None,
        };
        directory.insert(conn.clone()).await;

        assert_eq!(directory.lookup(conn.destination_id).await.unwrap(), Some(conn.clone()));
        directory.remove(conn.destination_id).await;
        assert_eq!(directory.lookup(conn.destination_id).await.unwrap(), None);
    }
}
