//! Commerce backend REST client.
//!
//! One method per backend endpoint. Responses are converted to
//! `arcade_core` types before they leave this module; the backend's field
//! names live in [`wire`] only.
//!
//! # Example
//!
//! ```rust,ignore
//! use arcade_storefront::api::BackendClient;
//!
//! let client = BackendClient::new(&config)?;
//! let items = client.list_items().await?;
//! let identity = client.login("player@arcade.io", "hunter22").await?;
//! client.add_to_cart(identity.id, items[0].id).await?;
//! ```

mod conversions;
mod wire;

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use arcade_core::{
    Identity, Item, ItemDraft, ItemId, Money, Purchase, PurchaseId, Rating, Score, UserId,
};

use crate::config::StorefrontConfig;

use conversions::{
    convert_items, convert_purchase, convert_rating, convert_user, draft_to_wire, parse_balance,
};
use wire::{
    AddToCartRequest, AvaliacaoDto, ChangePasswordRequest, CompraDto, ErrorBody, JogoDto,
    LoginRequest, RatingRequest, TopUpRequest, UserDto, UserUpdateRequest,
};

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed after a connection was made.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// No connection could be made, or the request timed out.
    #[error("Backend unreachable: {0}")]
    Unreachable(reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::Unreachable(e)
        } else {
            Self::Http(e)
        }
    }
}

impl ApiError {
    /// HTTP status of a backend error response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Build the message for a failed response.
///
/// JSON bodies contribute `message`, `error` or `details`; other bodies are
/// used as-is. Anything blank or unreadable falls back to `HTTP {status}`.
pub(crate) fn error_message(status: StatusCode, content_type: Option<&str>, body: &str) -> String {
    let fallback = || format!("HTTP {}", status.as_u16());
    let is_json = content_type.is_some_and(|ct| ct.contains("application/json"));
    if is_json {
        return serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(fallback);
    }
    let text = body.trim();
    if text.is_empty() {
        fallback()
    } else {
        text.to_string()
    }
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the commerce backend.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Http)?;
        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.api_url.clone(),
            }),
        })
    }

    /// Base URL every endpoint path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Parse(format!("bad endpoint path {path}: {e}")))?;
        Ok(self
            .inner
            .client
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string()))
    }

    /// Send a request; `None` means the backend returned no content.
    async fn execute(&self, request: RequestBuilder) -> Result<Option<String>, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(status, content_type.as_deref(), &body);
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(body))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self
            .execute(request)
            .await?
            .ok_or_else(|| ApiError::Parse("empty response".to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e.to_string())
        })
    }

    async fn execute_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    // =========================================================================
    // User Methods
    // =========================================================================

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the request fails.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: UserId) -> Result<Identity, ApiError> {
        let dto: UserDto = self
            .execute_json(self.request(Method::GET, &format!("user/{id}"))?)
            .await?;
        convert_user(dto)
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the account cannot be created.
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, ApiError> {
        let body = UserDto {
            id: None,
            nome: display_name.to_string(),
            email: email.to_string(),
            senha: Some(password.to_string()),
            saldo: None,
        };
        let dto: UserDto = self
            .execute_json(self.request(Method::POST, "user")?.json(&body))
            .await?;
        convert_user(dto)
    }

    /// Update a user's display name and/or email.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn update_user(
        &self,
        id: UserId,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Identity, ApiError> {
        let body = UserUpdateRequest {
            nome: display_name,
            email,
        };
        let dto: UserDto = self
            .execute_json(self.request(Method::PUT, &format!("user/{id}"))?.json(&body))
            .await?;
        convert_user(dto)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the credentials are rejected.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
        let body = LoginRequest {
            email,
            senha: password,
        };
        let dto: UserDto = self
            .execute_json(self.request(Method::POST, "user/login")?.json(&body))
            .await?;
        convert_user(dto)
    }

    /// Change a user's password.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the current password is wrong.
    #[instrument(skip(self, current, new), fields(user_id = %id))]
    pub async fn change_password(
        &self,
        id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), ApiError> {
        let body = ChangePasswordRequest {
            current_password: current,
            new_password: new,
        };
        self.execute_empty(
            self.request(Method::PUT, &format!("user/{id}/password"))?
                .json(&body),
        )
        .await
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// Fetch the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<Item>, ApiError> {
        let dtos: Vec<JogoDto> = self.execute_json(self.request(Method::GET, "jogo")?).await?;
        Ok(convert_items(dtos))
    }

    /// Fetch one catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the item does not exist or the request fails.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn get_item(&self, id: ItemId) -> Result<Item, ApiError> {
        let dto: JogoDto = self
            .execute_json(self.request(Method::GET, &format!("jogo/{id}"))?)
            .await?;
        conversions::convert_item(dto, 0)
    }

    /// Create a catalog entry with an already-checked image URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_item(
        &self,
        draft: &ItemDraft,
        image_url: Option<&str>,
    ) -> Result<Item, ApiError> {
        let body = draft_to_wire(draft, image_url);
        let dto: JogoDto = self
            .execute_json(self.request(Method::POST, "jogo")?.json(&body))
            .await?;
        conversions::convert_item(dto, 0)
    }

    /// Replace a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, draft), fields(item_id = %id))]
    pub async fn update_item(
        &self,
        id: ItemId,
        draft: &ItemDraft,
        image_url: Option<&str>,
    ) -> Result<Item, ApiError> {
        let body = draft_to_wire(draft, image_url);
        let dto: JogoDto = self
            .execute_json(self.request(Method::PUT, &format!("jogo/{id}"))?.json(&body))
            .await?;
        conversions::convert_item(dto, 0)
    }

    /// Delete a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete_item(&self, id: ItemId) -> Result<(), ApiError> {
        self.execute_empty(self.request(Method::DELETE, &format!("jogo/{id}"))?)
            .await
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Items in a user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list_cart(&self, user: UserId) -> Result<Vec<Item>, ApiError> {
        let dtos: Vec<JogoDto> = self
            .execute_json(self.request(Method::GET, &format!("cart/usuario/{user}/jogos"))?)
            .await?;
        Ok(convert_items(dtos))
    }

    /// Put an item in a user's cart.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the item cannot be added.
    #[instrument(skip(self), fields(user_id = %user, item_id = %item))]
    pub async fn add_to_cart(&self, user: UserId, item: ItemId) -> Result<(), ApiError> {
        let body = AddToCartRequest {
            jogo_id: item.as_i64(),
        };
        self.execute_empty(
            self.request(Method::POST, &format!("cart/usuario/{user}/jogos"))?
                .json(&body),
        )
        .await
    }

    /// Take an item out of a user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(user_id = %user, item_id = %item))]
    pub async fn remove_from_cart(&self, user: UserId, item: ItemId) -> Result<(), ApiError> {
        self.execute_empty(self.request(
            Method::DELETE,
            &format!("cart/usuario/{user}/jogos/{item}"),
        )?)
        .await
    }

    // =========================================================================
    // Wallet Methods
    // =========================================================================

    /// A user's wallet balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn get_balance(&self, user: UserId) -> Result<Money, ApiError> {
        let body = self
            .execute(self.request(Method::GET, &format!("wallet/{user}"))?)
            .await?;
        body.map_or(Ok(Money::ZERO), |b| parse_balance(&b))
    }

    /// Top up a wallet; returns the balance the backend reports afterwards.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the top-up is rejected.
    #[instrument(skip(self), fields(user_id = %user, amount = %amount))]
    pub async fn add_balance(&self, user: UserId, amount: Money) -> Result<Money, ApiError> {
        let body = TopUpRequest {
            valor: amount.amount(),
        };
        let response = self
            .execute(self.request(Method::POST, &format!("wallet/{user}"))?.json(&body))
            .await?
            .ok_or_else(|| ApiError::Parse("top-up returned no balance".to_string()))?;
        parse_balance(&response)
    }

    // =========================================================================
    // Library Methods
    // =========================================================================

    /// Items a user owns.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list_library(&self, user: UserId) -> Result<Vec<Item>, ApiError> {
        let dtos: Vec<JogoDto> = self
            .execute_json(self.request(Method::GET, &format!("library/usuario/{user}/jogos"))?)
            .await?;
        Ok(convert_items(dtos))
    }

    // =========================================================================
    // Purchase Methods
    // =========================================================================

    /// Buy everything in a user's cart.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the purchase is refused.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn checkout(&self, user: UserId) -> Result<Purchase, ApiError> {
        let dto: CompraDto = self
            .execute_json(self.request(Method::POST, &format!("compras/{user}"))?)
            .await?;
        convert_purchase(dto, Some(user))
    }

    /// A user's purchase records.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list_purchases(&self, user: UserId) -> Result<Vec<Purchase>, ApiError> {
        let dtos: Vec<CompraDto> = self
            .execute_json(self.request(Method::GET, &format!("compras/usuario/{user}"))?)
            .await?;
        dtos.into_iter()
            .map(|dto| convert_purchase(dto, Some(user)))
            .collect()
    }

    /// One purchase record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or the request fails.
    #[instrument(skip(self), fields(purchase_id = %id))]
    pub async fn get_purchase(&self, id: PurchaseId) -> Result<Purchase, ApiError> {
        let dto: CompraDto = self
            .execute_json(self.request(Method::GET, &format!("compras/{id}"))?)
            .await?;
        convert_purchase(dto, None)
    }

    /// Refund a purchase.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the refund is refused.
    #[instrument(skip(self), fields(purchase_id = %id))]
    pub async fn refund(&self, id: PurchaseId) -> Result<(), ApiError> {
        self.execute_empty(self.request(Method::POST, &format!("compras/{id}/reembolso"))?)
            .await
    }

    // =========================================================================
    // Rating Methods
    // =========================================================================

    /// Rate an item on behalf of a user.
    ///
    /// When the backend does not echo the stored rating, the submitted one
    /// is returned without an id.
    ///
    /// # Errors
    ///
    /// Returns the backend's message if the rating is refused.
    #[instrument(skip(self, comment), fields(user_id = %user, item_id = %item))]
    pub async fn create_rating(
        &self,
        user: UserId,
        item: ItemId,
        score: Score,
        comment: &str,
    ) -> Result<Rating, ApiError> {
        let body = RatingRequest {
            nota: score.get(),
            comentario: comment,
        };
        let response = self
            .execute(
                self.request(
                    Method::POST,
                    &format!("avaliacao/avaliacoes/usuario/{user}/jogo/{item}"),
                )?
                .json(&body),
            )
            .await?;
        let echoed = response
            .filter(|b| !b.trim().is_empty())
            .and_then(|b| serde_json::from_str::<AvaliacaoDto>(&b).ok());
        match echoed {
            Some(dto) => convert_rating(dto),
            None => Ok(Rating {
                id: None,
                score,
                comment: comment.to_string(),
                author: Some(user),
                item: Some(item),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client(server: &MockServer) -> BackendClient {
        let url = Url::parse(&server.uri()).unwrap();
        BackendClient::new(&StorefrontConfig::new(url, "unused")).unwrap()
    }

    #[test]
    fn test_error_message_sources() {
        let bad = StatusCode::BAD_REQUEST;
        assert_eq!(
            error_message(bad, Some("application/json"), r#"{"message":"Saldo insuficiente"}"#),
            "Saldo insuficiente"
        );
        assert_eq!(
            error_message(bad, Some("application/json; charset=utf-8"), r#"{"details":"d"}"#),
            "d"
        );
        assert_eq!(error_message(bad, Some("application/json"), "{}"), "HTTP 400");
        assert_eq!(error_message(bad, Some("application/json"), "oops"), "HTTP 400");
        assert_eq!(error_message(bad, Some("text/plain"), "Jogo já está no carrinho"), "Jogo já está no carrinho");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, None, ""), "HTTP 502");
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/login"))
            .and(header_exists(REQUEST_ID_HEADER))
            .and(body_json(serde_json::json!({"email": "p@arcade.io", "senha": "secret1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 3, "nome": "Pat", "email": "p@arcade.io", "saldo": 12.5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = client(&server).await.login("p@arcade.io", "secret1").await.unwrap();
        assert_eq!(identity.id, UserId::new(3));
        assert_eq!(identity.balance, Money::from_cents(1250));
    }

    #[tokio::test]
    async fn test_backend_error_message_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cart/usuario/1/jogos"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"error": "Game already in cart"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .add_to_cart(UserId::new(1), ItemId::new(2))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.to_string(), "Game already in cart");
    }

    #[tokio::test]
    async fn test_no_content_and_bare_number_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/jogo/4"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wallet/1"))
            .and(body_json(serde_json::json!({"valor": 25.0})))
            .respond_with(ResponseTemplate::new(200).set_body_string("75.0"))
            .mount(&server)
            .await;

        let client = client(&server).await;
        client.delete_item(ItemId::new(4)).await.unwrap();
        let balance = client
            .add_balance(UserId::new(1), Money::from_cents(2500))
            .await
            .unwrap();
        assert_eq!(balance, Money::from_cents(7500));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_classified() {
        // Nothing listens on the discard port.
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9").unwrap(), "unused");
        let err = BackendClient::new(&config)
            .unwrap()
            .list_items()
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unreachable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_rating_without_echo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/avaliacao/avaliacoes/usuario/1/jogo/2"))
            .and(body_json(serde_json::json!({"nota": 4, "comentario": "Great"})))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let rating = client(&server)
            .await
            .create_rating(UserId::new(1), ItemId::new(2), Score::new(4).unwrap(), "Great")
            .await
            .unwrap();
        assert_eq!(rating.id, None);
        assert_eq!(rating.item, Some(ItemId::new(2)));
    }
}
