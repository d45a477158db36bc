//! Serverless functions client.
//!
//! The functions backend offers an alternate checkout path and a catalog
//! sync job. Neither is part of the primary purchase flow; they are exposed
//! for operators through the CLI.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use arcade_core::Item;

use crate::api::{ApiError, REQUEST_ID_HEADER, error_message};
use crate::config::FunctionsConfig;

/// Result of the `process-checkout` function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionCheckout {
    pub success: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total: Option<Decimal>,
}

/// Result of the `sync-games` function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    #[serde(default)]
    pub synced: u64,
}

/// What `sync-games` should import.
#[derive(Debug, Clone)]
pub enum SyncSource {
    /// Push these items directly.
    Items(Vec<Item>),
    /// Let the function fetch the listing from this URL itself.
    Listing(Url),
}

/// Game shape the sync function upserts.
#[derive(Debug, Serialize)]
struct SyncGame<'a> {
    id: i64,
    title: &'a str,
    description: Option<&'a str>,
    image_url: Option<&'a str>,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    original_price: Decimal,
    discount: u8,
    rating: f64,
    tags: &'a [String],
}

impl<'a> From<&'a Item> for SyncGame<'a> {
    fn from(item: &'a Item) -> Self {
        Self {
            id: item.id.as_i64(),
            title: &item.title,
            description: item.description.as_deref(),
            image_url: item.image.remote_url(),
            price: item.price.amount(),
            original_price: item.original_price.amount(),
            discount: item.discount,
            rating: item.rating,
            tags: &item.tags,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    games: Option<Vec<SyncGame<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_url: Option<&'a str>,
}

/// Client for the serverless functions.
#[derive(Clone)]
pub struct FunctionsClient {
    inner: Arc<FunctionsClientInner>,
}

struct FunctionsClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl FunctionsClient {
    /// Create a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &FunctionsConfig, timeout: std::time::Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Http)?;
        Ok(Self {
            inner: Arc::new(FunctionsClientInner {
                client,
                base_url: config.url.clone(),
                token: config.token.clone(),
            }),
        })
    }

    async fn invoke<T, B>(&self, name: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: for<'de> Deserialize<'de>,
        B: Serialize + ?Sized,
    {
        let url = self
            .inner
            .base_url
            .join(name)
            .map_err(|e| ApiError::Parse(format!("bad function name {name}: {e}")))?;
        let mut request = self
            .inner
            .client
            .post(url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.inner.token.expose_secret()),
            )
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(function = name, status = %status, "Function call failed");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(status, content_type.as_deref(), &text),
            });
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Err(ApiError::Parse(format!("function {name} returned no body")));
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Run the serverless checkout for the token's user.
    ///
    /// # Errors
    ///
    /// Returns the function's message if checkout fails (e.g. empty cart).
    #[instrument(skip(self))]
    pub async fn process_checkout(&self) -> Result<FunctionCheckout, ApiError> {
        self.invoke::<_, ()>("process-checkout", None).await
    }

    /// Import catalog entries into the functions backend.
    ///
    /// # Errors
    ///
    /// Returns the function's message if the sync fails.
    #[instrument(skip(self, source))]
    pub async fn sync_games(&self, source: &SyncSource) -> Result<SyncReport, ApiError> {
        let body = match source {
            SyncSource::Items(items) => SyncRequest {
                games: Some(items.iter().map(SyncGame::from).collect()),
                api_url: None,
            },
            SyncSource::Listing(url) => SyncRequest {
                games: None,
                api_url: Some(url.as_str()),
            },
        };
        self.invoke("sync-games", Some(&body)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> FunctionsClient {
        let config = FunctionsConfig {
            url: Url::parse(&format!("{}/functions/v1/", server.uri())).unwrap(),
            token: SecretString::from("fn-token-for-tests"),
        };
        FunctionsClient::new(&config, std::time::Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_process_checkout_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/process-checkout"))
            .and(header("authorization", "Bearer fn-token-for-tests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "order_id": "ord_1", "total": 55.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).process_checkout().await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.order_id.as_deref(), Some("ord_1"));
        assert_eq!(outcome.total, Some(Decimal::new(55, 0)));
    }

    #[tokio::test]
    async fn test_empty_cart_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/process-checkout"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "Cart is empty"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).process_checkout().await.unwrap_err();
        assert_eq!(err.to_string(), "Cart is empty");
    }

    #[tokio::test]
    async fn test_sync_from_listing_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/sync-games"))
            .and(body_partial_json(serde_json::json!({"apiUrl": "http://localhost:8081/jogo"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true, "synced": 12})),
            )
            .mount(&server)
            .await;

        let source = SyncSource::Listing(Url::parse("http://localhost:8081/jogo").unwrap());
        let report = client(&server).sync_games(&source).await.unwrap();
        assert_eq!(report.synced, 12);
    }
}
