use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crosspost_core::error::PublishError;
use crosspost_core::ports::{DestinationClient, PublishRequest};

/// Routes each publish to the client registered for the destination's platform.
#[derive(Default, Clone)]
pub struct PlatformRouter {
    routes: HashMap<String, Arc<dyn DestinationClient>>,
}

impl PlatformRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, platform: impl Into<String>, client: Arc<dyn DestinationClient>) -> Self {
        self.routes.insert(platform.into(), client);
        self
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }
}

#[async_trait]
impl DestinationClient for PlatformRouter {
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        let platform = &request.destination.platform;
        match self.routes.get(platform) {
            Some(client) => client.publish(request).await,
            None => Err(PublishError::rejected(format!(
                "No client registered for platform '{platform}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_core::domain::{DestinationConnection, PostContent};
    use crosspost_core::error::PublishErrorKind;
    use uuid::Uuid;

    struct Fixed(&'static str);

    #[async_trait]
    impl DestinationClient for Fixed {
        async fn publish(&self, _request: PublishRequest<'_>) -> Result<String, PublishError> {
            Ok(self.0.to_string())
        }
    }

    fn destination(platform: &str) -> DestinationConnection {
        DestinationConnection {
            destination_id: Uuid::new_v4(),
            platform: platform.into(),
            external_id: "acct".into(),
            access_token: "t".into(),
            token_expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_routes_by_platform() {
        let router = PlatformRouter::new()
            .with_route("graph", Arc::new(Fixed("g-1")))
            .with_route("social", Arc::new(Fixed("s-1")));
        let content = PostContent::default();

        let dest = destination("social");
        let id = router
            .publish(PublishRequest {
                post_id: Uuid::new_v4(),
                destination: &dest,
                content: &content,
            })
            .await
            .unwrap();
        assert_eq!(id, "s-1");

        let dest = destination("unknown");
        let err = router
            .publish(PublishRequest {
                post_id: Uuid::new_v4(),
                destination: &dest,
                content: &content,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, PublishErrorKind::Rejected);
    }
}
