//! Shared fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::BackendClient;
use crate::config::{SessionConfig, StorefrontConfig};
use crate::notice::NoticeLog;
use crate::session::SessionStore;
use crate::storage::{KeyValueStorage, MemoryStorage, keys};

pub fn user_json(id: i64, saldo: f64) -> Value {
    json!({
        "id": id,
        "nome": format!("Player {id}"),
        "email": format!("player{id}@arcade.io"),
        "saldo": saldo,
    })
}

pub fn jogo_json(id: i64, nome: &str, preco: f64) -> Value {
    json!({
        "id": id,
        "nome": nome,
        "gender": "Action, Indie",
        "preco": preco,
        "descricao": format!("{nome} description"),
    })
}

/// A mock backend plus a session store wired to it.
pub struct Harness {
    pub server: MockServer,
    pub config: StorefrontConfig,
    pub api: BackendClient,
    pub storage: Arc<MemoryStorage>,
    pub notices: Arc<NoticeLog>,
    pub session: Arc<SessionStore>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_session_config(SessionConfig::default()).await
    }

    pub async fn with_session_config(session: SessionConfig) -> Self {
        let server = MockServer::start().await;
        let mut config = StorefrontConfig::new(Url::parse(&server.uri()).unwrap(), "unused");
        config.session = session;
        config.checkout_redirect_delay = std::time::Duration::ZERO;
        let api = BackendClient::new(&config).unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let session = Arc::new(SessionStore::new(
            api.clone(),
            storage.clone(),
            config.session,
        ));
        Self {
            server,
            config,
            api,
            storage,
            notices: Arc::new(NoticeLog::new()),
            session,
        }
    }

    pub async fn mock_login(&self, id: i64, saldo: f64) {
        Mock::given(method("POST"))
            .and(path("/user/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, saldo)))
            .mount(&self.server)
            .await;
    }

    /// Sign in as user `id` through the mock backend.
    pub async fn login(&self, id: i64, saldo: f64) {
        self.mock_login(id, saldo).await;
        self.session
            .login(&format!("player{id}@arcade.io"), "secret1")
            .await
            .unwrap();
    }

    /// Write a persisted session issued at `issued_at` (epoch millis).
    pub fn seed_session(&self, id: i64, issued_at: i64) {
        let identity: arcade_core::Identity = serde_json::from_value(json!({
            "id": id,
            "display_name": format!("Player {id}"),
            "email": format!("player{id}@arcade.io"),
            "balance": "0",
        }))
        .unwrap();
        self.storage
            .set(keys::CURRENT_USER, &serde_json::to_string(&identity).unwrap())
            .unwrap();
        self.storage
            .set(keys::SESSION_TIMESTAMP, &issued_at.to_string())
            .unwrap();
    }
}
