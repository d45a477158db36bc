//! Session lifecycle: restore, expiry, sign-out fan-out, idle monitor.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use arcade_core::Money;
use arcade_integration_tests::{TestContext, compra_json, jogo_json};
use arcade_storefront::config::SessionConfig;
use arcade_storefront::session::ActivityKind;

async fn mount_account(ctx: &TestContext) {
    ctx.mount_user(1, 20.0).await;
    Mock::given(method("GET"))
        .and(path("/wallet/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("20"))
        .mount(&ctx.server)
        .await;
    ctx.get_json("/cart/usuario/1/jogos", json!([jogo_json(2, "Hollow Depths", 25.0)]))
        .await;
    ctx.get_json("/library/usuario/1/jogos", json!([jogo_json(1, "Skyline Rally", 30.0)]))
        .await;
    ctx.get_json(
        "/compras/usuario/1",
        json!([compra_json(5, 1, &[jogo_json(1, "Skyline Rally", 30.0)], 30.0)]),
    )
    .await;
    ctx.get_json("/jogo", json!([])).await;
}

#[tokio::test]
async fn test_restore_loads_identity_scoped_stores() {
    let ctx = TestContext::new().await;
    mount_account(&ctx).await;
    ctx.seed_session(1, Money::from_cents(2000), Duration::from_secs(3600));

    let identity = ctx.store.start().await.unwrap();
    assert_eq!(identity.display_name, "Player 1");
    assert_eq!(ctx.store.cart().len().await, 1);
    assert_eq!(ctx.store.library().items().await.len(), 1);
    assert_eq!(ctx.store.history().purchases().await.len(), 1);
    assert_eq!(ctx.store.wallet().balance().await, Money::from_cents(2000));
}

#[tokio::test]
async fn test_expired_session_is_purged() {
    let ctx = TestContext::new().await;
    mount_account(&ctx).await;
    ctx.seed_session(1, Money::ZERO, Duration::from_secs(25 * 3600));

    assert!(ctx.store.start().await.is_none());
    assert!(!ctx.has_persisted_session());
    assert!(!ctx.store.session().is_authenticated().await);
}

#[tokio::test]
async fn test_backend_rejection_purges_session() {
    let ctx = TestContext::new().await;
    ctx.get_json("/jogo", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/user/1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Usuário não encontrado"))
        .mount(&ctx.server)
        .await;
    ctx.seed_session(1, Money::ZERO, Duration::from_secs(60));

    assert!(!ctx.store.session().validate_session().await);
    assert!(!ctx.has_persisted_session());
}

#[tokio::test]
async fn test_logout_resets_every_identity_scoped_store() {
    let ctx = TestContext::new().await;
    mount_account(&ctx).await;
    ctx.login(1).await;
    assert_eq!(ctx.store.cart().len().await, 1);
    assert!(ctx.store.monitor().is_watching());

    ctx.store.session().logout().await;

    assert!(ctx.store.cart().is_empty().await);
    assert_eq!(ctx.store.wallet().balance().await, Money::ZERO);
    assert!(ctx.store.library().items().await.is_empty());
    assert!(ctx.store.history().purchases().await.is_empty());
    assert!(!ctx.store.monitor().is_watching());
    assert!(!ctx.has_persisted_session());
}

#[tokio::test]
async fn test_unchanged_balance_does_not_rewrite_snapshot() {
    let ctx = TestContext::new().await;
    mount_account(&ctx).await;
    ctx.login(1).await;

    let writes = ctx.storage.write_count();
    ctx.store.wallet().refresh_balance().await.unwrap();
    assert_eq!(ctx.storage.write_count(), writes);
}

#[tokio::test]
async fn test_idle_window_signs_out() {
    let ctx = TestContext::with_session(SessionConfig {
        idle_timeout: Duration::from_millis(300),
        ..SessionConfig::default()
    })
    .await;
    mount_account(&ctx).await;
    ctx.login(1).await;

    // Activity inside the window keeps the session alive.
    tokio::time::sleep(Duration::from_millis(150)).await;
    ctx.store.monitor().record_activity(ActivityKind::Pointer);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(ctx.store.session().is_authenticated().await);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!ctx.store.session().is_authenticated().await);
    assert!(ctx.store.cart().is_empty().await);
    assert!(
        ctx.notices
            .snapshot()
            .iter()
            .any(|n| n.title == "Session inactive")
    );
}

#[tokio::test]
async fn test_session_survives_restart_on_disk() {
    use std::sync::Arc;

    use arcade_storefront::{NoticeLog, Storefront, StorefrontConfig};

    let ctx = TestContext::new().await;
    mount_account(&ctx).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config =
        StorefrontConfig::new(url::Url::parse(&ctx.server.uri()).unwrap(), dir.path());
    config.checkout_redirect_delay = Duration::ZERO;

    let first = Storefront::new(config.clone(), Arc::new(NoticeLog::new())).unwrap();
    first
        .session()
        .login("player1@arcade.io", "secret1")
        .await
        .unwrap();
    drop(first);

    let second = Storefront::new(config, Arc::new(NoticeLog::new())).unwrap();
    let restored = second.start().await.unwrap();
    assert_eq!(restored.email.as_str(), "player1@arcade.io");
    assert_eq!(second.cart().len().await, 1);
}
