//! End-to-end tests for the Arcade storefront.
//!
//! Each test runs a full [`Storefront`] against a `wiremock` server that
//! speaks the backend's REST dialect, so no backend has to be running.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p arcade-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Cart, balance guard, checkout and its aftermath
//! - `session_flow` - Restore, expiry, sign-out fan-out, idle monitor
//! - `purchases_flow` - Purchase history and refunds

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arcade_core::{Email, Identity, Money, UserId};
use arcade_storefront::config::SessionConfig;
use arcade_storefront::storage::{KeyValueStorage, MemoryStorage, keys};
use arcade_storefront::{NoticeLog, Storefront, StorefrontConfig};

/// Backend user body.
#[must_use]
pub fn user_json(id: i64, saldo: f64) -> Value {
    json!({
        "id": id,
        "nome": format!("Player {id}"),
        "email": format!("player{id}@arcade.io"),
        "saldo": saldo,
    })
}

/// Backend game body.
#[must_use]
pub fn jogo_json(id: i64, nome: &str, preco: f64) -> Value {
    json!({
        "id": id,
        "nome": nome,
        "gender": "Action, Adventure",
        "preco": preco,
    })
}

/// Backend purchase body.
#[must_use]
pub fn compra_json(id: i64, user: i64, jogos: &[Value], valor: f64) -> Value {
    json!({
        "id": id,
        "usuarioId": user,
        "jogos": jogos,
        "valor": valor,
        "dataCompra": "2024-06-01T18:30:00",
    })
}

/// A storefront wired to a mock backend.
pub struct TestContext {
    pub server: MockServer,
    pub storage: Arc<MemoryStorage>,
    pub notices: Arc<NoticeLog>,
    pub store: Storefront,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_session(SessionConfig::default()).await
    }

    pub async fn with_session(session: SessionConfig) -> Self {
        let server = MockServer::start().await;
        let mut config = StorefrontConfig::new(Url::parse(&server.uri()).unwrap(), "unused");
        config.session = session;
        config.checkout_redirect_delay = Duration::ZERO;
        let storage = Arc::new(MemoryStorage::new());
        let notices = Arc::new(NoticeLog::new());
        let store = Storefront::with_storage(config, storage.clone(), notices.clone()).unwrap();
        Self {
            server,
            storage,
            notices,
            store,
        }
    }

    /// Mount a `GET` returning `body` as JSON.
    pub async fn get_json(&self, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount a `GET` returning `body` as JSON for the first `times` calls only.
    pub async fn get_json_times(&self, route: &str, body: Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Mount everything user `id` needs to sign in with an empty account.
    pub async fn mount_user(&self, id: i64, saldo: f64) {
        Mock::given(method("POST"))
            .and(path("/user/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, saldo)))
            .mount(&self.server)
            .await;
        self.get_json(&format!("/user/{id}"), user_json(id, saldo)).await;
    }

    /// Sign in as user `id`.
    pub async fn login(&self, id: i64) -> Identity {
        self.store
            .session()
            .login(&format!("player{id}@arcade.io"), "secret1")
            .await
            .unwrap()
    }

    /// Write a persisted session for user `id`, issued `age` ago.
    pub fn seed_session(&self, id: i64, balance: Money, age: Duration) {
        let identity = Identity {
            id: UserId::new(id),
            display_name: format!("Player {id}"),
            email: Email::parse(&format!("player{id}@arcade.io")).unwrap(),
            balance,
        };
        let issued_at = now_millis() - i64::try_from(age.as_millis()).unwrap();
        self.storage
            .set(keys::CURRENT_USER, &serde_json::to_string(&identity).unwrap())
            .unwrap();
        self.storage
            .set(keys::SESSION_TIMESTAMP, &issued_at.to_string())
            .unwrap();
    }

    /// Whether a session is persisted.
    #[must_use]
    pub fn has_persisted_session(&self) -> bool {
        self.storage.get(keys::CURRENT_USER).unwrap().is_some()
    }
}

fn now_millis() -> i64 {
    i64::try_from(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis(),
    )
    .unwrap()
}
