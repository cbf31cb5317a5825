//! Graph-style HTTP destination client.
//!
//! One `POST {base_url}/{external_id}/feed` per call. The response status is
//! classified into a [`PublishErrorKind`]; nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crosspost_core::error::{PublishError, PublishErrorKind};
use crosspost_core::ports::{DestinationClient, PublishRequest};

/// HTTP destination client configuration.
#[derive(Debug, Clone)]
pub struct HttpDestinationConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpDestinationConfig {
    /// Returns `None` when `DESTINATION_API_BASE_URL` is not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("DESTINATION_API_BASE_URL").ok()?;
        Some(Self {
            base_url,
            timeout: Duration::from_secs(
                std::env::var("DESTINATION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

#[derive(Serialize)]
struct FeedRequest<'a> {
    message: &'a str,
    media_urls: &'a [String],
    idempotency_key: String,
}

#[derive(Deserialize)]
struct FeedResponse {
    id: Option<String>,
}

/// Destination client speaking the feed API over HTTP.
pub struct HttpDestinationClient {
    client: Client,
    base_url: String,
}

impl HttpDestinationClient {
    pub fn new(config: HttpDestinationConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn feed_url(&self, external_id: &str) -> String {
        format!("{}/{}/feed", self.base_url, external_id)
    }
}

/// Map a non-success response onto the error taxonomy.
fn classify(status: StatusCode, retry_after: Option<Duration>, body: String) -> PublishError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => PublishError::rate_limited(message, retry_after),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::auth_invalid(message),
        StatusCode::REQUEST_TIMEOUT => PublishError::transient(message),
        s if s.is_client_error() => PublishError::rejected(message),
        _ => PublishError::transient(message),
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates are ignored.
fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[async_trait]
impl DestinationClient for HttpDestinationClient {
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        let destination = request.destination;
        let body = FeedRequest {
            message: &request.content.message,
            media_urls: &request.content.media_urls,
            idempotency_key: request.idempotency_key(),
        };

        let response = self
            .client
            .post(self.feed_url(&destination.external_id))
            .bearer_auth(&destination.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::transient(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            let text = response.text().await.unwrap_or_default();
            let err = classify(status, retry_after, text);
            tracing::debug!(
                destination_id = %destination.destination_id,
                status = status.as_u16(),
                kind = %err.kind,
                "Destination refused publish"
            );
            return Err(err);
        }

        let payload: FeedResponse = response
            .json()
            .await
            .map_err(|e| PublishError::transient(format!("Unreadable response: {e}")))?;

        match payload.id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(id),
            None => Err(PublishError::new(
                PublishErrorKind::Transient,
                "Response carried no post id",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_core::domain::{DestinationConnection, PostContent};
    use test_case::test_case;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test_case(429, PublishErrorKind::RateLimited ; "too many requests")]
    #[test_case(401, PublishErrorKind::AuthInvalid ; "unauthorized")]
    #[test_case(403, PublishErrorKind::AuthInvalid ; "forbidden")]
    #[test_case(408, PublishErrorKind::Transient ; "request timeout")]
    #[test_case(400, PublishErrorKind::Rejected ; "bad request")]
    #[test_case(422, PublishErrorKind::Rejected ; "unprocessable")]
    #[test_case(500, PublishErrorKind::Transient ; "server error")]
    #[test_case(503, PublishErrorKind::Transient ; "unavailable")]
    fn test_status_mapping(code: u16, expected: PublishErrorKind) {
        let status = StatusCode::from_u16(code).unwrap();
        assert_eq!(classify(status, None, String::new()).kind, expected);
    }

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after(Some(" 7 ")), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    fn destination() -> DestinationConnection {
        DestinationConnection {
            destination_id: Uuid::new_v4(),
            platform: "graph".into(),
            external_id: "page-1".into(),
            access_token: "secret".into(),
            token_expires_at: None,
        }
    }

    fn client(server: &MockServer) -> HttpDestinationClient {
        HttpDestinationClient::new(HttpDestinationConfig {
            base_url: format!("{}/", server.uri()),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_returns_remote_id() {
        let server = MockServer::start().await;
        let dest = destination();
        let post_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/page-1/feed"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "message": "hello",
                "idempotency_key": format!("{}:{}", post_id, dest.destination_id),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "remote-42"})))
            .expect(1)
            .mount(&server)
            .await;

        let content = PostContent {
            message: "hello".into(),
            media_urls: vec![],
        };
        let remote_id = client(&server)
            .publish(PublishRequest {
                post_id,
                destination: &dest,
                content: &content,
            })
            .await
            .unwrap();

        assert_eq!(remote_id, "remote-42");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
            .mount(&server)
            .await;

        let dest = destination();
        let content = PostContent::default();
        let err = client(&server)
            .publish(PublishRequest {
                post_id: Uuid::new_v4(),
                destination: &dest,
                content: &content,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, PublishErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(12)));
    }

    #[tokio::test]
    async fn test_success_without_id_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let dest = destination();
        let content = PostContent::default();
        let err = client(&server)
            .publish(PublishRequest {
                post_id: Uuid::new_v4(),
                destination: &dest,
                content: &content,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, PublishErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_rejection_keeps_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("duplicate status"))
            .mount(&server)
            .await;

        let dest = destination();
        let content = PostContent::default();
        let err = client(&server)
            .publish(PublishRequest {
                post_id: Uuid::new_v4(),
                destination: &dest,
                content: &content,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, PublishErrorKind::Rejected);
        assert!(err.message.contains("duplicate status"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let client = HttpDestinationClient::new(HttpDestinationConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let dest = destination();
        let content = PostContent::default();
        let err = client
            .publish(PublishRequest {
                post_id: Uuid::new_v4(),
                destination: &dest,
                content: &content,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, PublishErrorKind::Transient);
    }
}
