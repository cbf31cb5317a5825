//! Application state - shared across all handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crosspost_core::ports::{DestinationClient, DestinationDirectory, PublishStore};
use crosspost_infra::{
    HttpDestinationClient, InMemoryDestinationDirectory, InMemoryPublishStore, PlatformRouter,
};
use crosspost_publisher::{
    OrchestratorConfig, OverdueScanner, PostService, ProgressReporter, PublishOrchestrator,
};

#[cfg(feature = "postgres")]
use crosspost_infra::DatabaseConnections;

use crate::config::AppConfig;

/// Platform key served by the HTTP destination client.
pub const GRAPH_PLATFORM: &str = "graph";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PublishOrchestrator>,
    pub scanner: Arc<OverdueScanner>,
    pub progress: Arc<ProgressReporter>,
    pub posts: Arc<PostService>,
    /// Cancelled on shutdown; request-scoped dispatches derive from it.
    pub shutdown: CancellationToken,
    pub storage: &'static str,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let (store, directory, storage) = Self::storage(config).await;
        let client = Self::client(config);
        Self::assemble(store, directory, client, config.orchestrator.clone(), storage)
    }

    /// Wire services on top of the given adapters.
    pub fn assemble(
        store: Arc<dyn PublishStore>,
        directory: Arc<dyn DestinationDirectory>,
        client: Arc<dyn DestinationClient>,
        orchestrator: OrchestratorConfig,
        storage: &'static str,
    ) -> Self {
        #[allow(unused_mut)]
        let mut orchestrator = PublishOrchestrator::new(store.clone(), directory, client, orchestrator);

        #[cfg(feature = "rate-limit")]
        {
            let limiter = crosspost_infra::InMemoryRateLimiter::from_env();
            orchestrator = orchestrator.with_rate_limiter(Arc::new(limiter));
        }

        let orchestrator = Arc::new(orchestrator);
        let shutdown = CancellationToken::new();
        let scanner = OverdueScanner::new(store.clone(), orchestrator.clone())
            .with_cancellation(shutdown.child_token());
        tracing::info!("Application state initialized");

        Self {
            scanner: Arc::new(scanner),
            progress: Arc::new(ProgressReporter::new(store.clone())),
            posts: Arc::new(PostService::new(store)),
            orchestrator,
            shutdown,
            storage,
        }
    }

    #[cfg(feature = "postgres")]
    async fn storage(
        config: &AppConfig,
    ) -> (Arc<dyn PublishStore>, Arc<dyn DestinationDirectory>, &'static str) {
        if let Some(db_config) = &config.database {
            match DatabaseConnections::init(db_config).await {
                Ok(connections) => {
                    return (
                        Arc::new(connections.publish_store()),
                        Arc::new(connections.destination_directory()),
                        "postgres",
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory fallback.",
                        e
                    );
                }
            }
        } else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        }
        Self::in_memory()
    }

    #[cfg(not(feature = "postgres"))]
    async fn storage(
        _config: &AppConfig,
    ) -> (Arc<dyn PublishStore>, Arc<dyn DestinationDirectory>, &'static str) {
        tracing::info!("Running without postgres feature - using in-memory store");
        Self::in_memory()
    }

    fn in_memory() -> (Arc<dyn PublishStore>, Arc<dyn DestinationDirectory>, &'static str) {
        (
            Arc::new(InMemoryPublishStore::new()),
            Arc::new(InMemoryDestinationDirectory::new()),
            "memory",
        )
    }

    fn client(config: &AppConfig) -> Arc<dyn DestinationClient> {
        let mut router = PlatformRouter::new();
        match config.destination.clone().map(HttpDestinationClient::new) {
            Some(Ok(http)) => router = router.with_route(GRAPH_PLATFORM, Arc::new(http)),
            Some(Err(e)) => tracing::error!(error = %e, "Failed to build destination client"),
            None => tracing::warn!("DESTINATION_API_BASE_URL not set, publishes will be rejected"),
        }
        tracing::info!(platforms = ?router.platforms(), "Destination clients ready");
        Arc::new(router)
    }
}
