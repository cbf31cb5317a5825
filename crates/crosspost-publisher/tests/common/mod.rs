#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crosspost_core::domain::{DestinationConnection, Post, PostContent};
use crosspost_core::error::PublishError;
use crosspost_core::policy::RetryPolicy;
use crosspost_core::ports::{
    DestinationClient, PublishRequest, RateLimitError, RateLimitResult, RateLimiter,
};
use crosspost_infra::{InMemoryDestinationDirectory, InMemoryPublishStore};
use crosspost_publisher::{NewPost, OrchestratorConfig, PostService, PublishOrchestrator};

/// Destination client whose answers are scripted per destination.
///
/// Scripted results are consumed in order; afterwards every call succeeds
/// unless the destination was set to always fail.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<Uuid, VecDeque<Result<String, PublishError>>>>,
    always: Mutex<HashMap<Uuid, PublishError>>,
    calls: Mutex<HashMap<Uuid, u32>>,
    delay: Duration,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn script(&self, destination_id: Uuid, results: Vec<Result<String, PublishError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(destination_id, results.into());
    }

    pub fn always_fail(&self, destination_id: Uuid, err: PublishError) {
        self.always.lock().unwrap().insert(destination_id, err);
    }

    pub fn calls(&self, destination_id: Uuid) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&destination_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl DestinationClient for ScriptedClient {
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        let destination_id = request.destination.destination_id;
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(destination_id).or_insert(0);
            *count += 1;
            *count
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(err) = self.always.lock().unwrap().get(&destination_id) {
            return Err(err.clone());
        }
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&destination_id)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(format!("remote-{destination_id}-{call}")))
    }
}

/// Limiter that turns away the first `denials` checks.
pub struct DenyFirst {
    denials: Mutex<u32>,
    pub wait: Duration,
}

impl DenyFirst {
    pub fn new(denials: u32, wait: Duration) -> Self {
        Self {
            denials: Mutex::new(denials),
            wait,
        }
    }
}

#[async_trait]
impl RateLimiter for DenyFirst {
    async fn check(&self, _key: &str) -> Result<RateLimitResult, RateLimitError> {
        let mut denials = self.denials.lock().unwrap();
        if *denials == 0 {
            return Ok(RateLimitResult {
                allowed: true,
                remaining: 1,
                reset_after: Duration::ZERO,
            });
        }
        *denials -= 1;
        Ok(RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_after: self.wait,
        })
    }
}

pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_parallelism: 4,
        retry: RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
        },
        lease_ttl: Duration::from_secs(60),
    }
}

pub struct Harness {
    pub store: Arc<InMemoryPublishStore>,
    pub directory: Arc<InMemoryDestinationDirectory>,
    pub client: Arc<ScriptedClient>,
    pub orchestrator: Arc<PublishOrchestrator>,
    pub posts: PostService,
}

impl Harness {
    pub fn new(client: ScriptedClient) -> Self {
        Self::build(client, fast_config(), None)
    }

    pub fn build(
        client: ScriptedClient,
        config: OrchestratorConfig,
        limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Self {
        let store = Arc::new(InMemoryPublishStore::new());
        let directory = Arc::new(InMemoryDestinationDirectory::new());
        let client = Arc::new(client);

        let mut orchestrator =
            PublishOrchestrator::new(store.clone(), directory.clone(), client.clone(), config);
        if let Some(limiter) = limiter {
            orchestrator = orchestrator.with_rate_limiter(limiter);
        }

        Self {
            posts: PostService::new(store.clone()),
            store,
            directory,
            client,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Register a destination with valid credentials.
    pub async fn destination(&self) -> Uuid {
        self.destination_expiring(None).await
    }

    pub async fn destination_expiring(&self, expires_at: Option<DateTime<Utc>>) -> Uuid {
        let destination_id = Uuid::new_v4();
        self.directory
            .insert(DestinationConnection {
                destination_id,
                platform: "graph".into(),
                external_id: format!("page-{destination_id}"),
                access_token: "token".into(),
                token_expires_at: expires_at,
            })
            .await;
        destination_id
    }

    pub async fn post(&self, destinations: &[Uuid]) -> Post {
        self.scheduled_post(destinations, None).await
    }

    pub async fn scheduled_post(
        &self,
        destinations: &[Uuid],
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Post {
        self.posts
            .create_post(NewPost {
                content: PostContent {
                    message: "Spring collection is live".into(),
                    media_urls: vec!["https://cdn.example.com/spring.jpg".into()],
                },
                destination_ids: destinations.to_vec(),
                scheduled_at,
                draft: false,
            })
            .await
            .unwrap()
    }
}
