//! Cart to purchase, end to end.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use arcade_core::{ItemId, Money};
use arcade_integration_tests::{TestContext, compra_json, jogo_json};
use arcade_storefront::{CheckoutError, NoticeLevel, Route};

async fn mount_wallet(ctx: &TestContext, body: &str, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/wallet/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(&ctx.server).await,
        None => mock.mount(&ctx.server).await,
    }
}

#[tokio::test]
async fn test_insufficient_balance_blocks_checkout() {
    let ctx = TestContext::new().await;
    ctx.mount_user(1, 50.0).await;
    mount_wallet(&ctx, "50.00", None).await;
    ctx.get_json(
        "/cart/usuario/1/jogos",
        json!([jogo_json(1, "Skyline Rally", 30.0), jogo_json(2, "Hollow Depths", 25.0)]),
    )
    .await;
    ctx.get_json("/library/usuario/1/jogos", json!([])).await;
    ctx.get_json("/compras/usuario/1", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/compras/1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.server)
        .await;

    ctx.login(1).await;
    assert_eq!(ctx.store.cart().total().await, Money::from_cents(5500));
    ctx.notices.drain();

    let err = ctx.store.checkout().checkout().await.unwrap_err();
    match &err {
        CheckoutError::InsufficientBalance { needed, available } => {
            assert_eq!(*needed, Money::from_cents(5500));
            assert_eq!(*available, Money::from_cents(5000));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.route(), Some(Route::Account));

    let notices = ctx.notices.drain();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].title, "Insufficient balance");
    assert_eq!(notices[0].action, Some(Route::Account));
    assert_eq!(ctx.store.cart().len().await, 2);
}

#[tokio::test]
async fn test_checkout_moves_cart_into_library() {
    let ctx = TestContext::new().await;
    ctx.mount_user(1, 100.0).await;
    let rally = jogo_json(1, "Skyline Rally", 30.0);
    let depths = jogo_json(2, "Hollow Depths", 25.0);

    // Sign-in and the pre-checkout refresh see 100, afterwards the backend
    // has charged 55.
    mount_wallet(&ctx, "100", Some(2)).await;
    mount_wallet(&ctx, "45", None).await;
    ctx.get_json("/cart/usuario/1/jogos", json!([rally, depths])).await;
    ctx.get_json_times("/library/usuario/1/jogos", json!([]), 1).await;
    ctx.get_json("/library/usuario/1/jogos", json!([rally, depths])).await;
    ctx.get_json("/compras/usuario/1", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/compras/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(compra_json(31, 1, &[rally, depths], 55.0)),
        )
        .expect(1)
        .mount(&ctx.server)
        .await;

    ctx.login(1).await;
    let receipt = ctx.store.checkout().checkout().await.unwrap();

    assert_eq!(receipt.item_count, 2);
    assert_eq!(receipt.total, Money::from_cents(5500));
    assert_eq!(receipt.next, Route::Library);
    assert_eq!(receipt.purchase.items.len(), 2);

    assert!(ctx.store.cart().is_empty().await);
    assert_eq!(ctx.store.wallet().balance().await, Money::from_cents(4500));
    assert_eq!(
        ctx.store.session().current().await.unwrap().balance,
        Money::from_cents(4500)
    );
    assert!(ctx.store.library().contains(ItemId::new(1)).await);
    assert!(ctx.store.library().contains(ItemId::new(2)).await);

    let notices = ctx.notices.drain();
    assert!(notices.iter().any(|n| n.title == "Purchase complete"));
}

#[tokio::test]
async fn test_duplicate_add_sends_one_request() {
    let ctx = TestContext::new().await;
    ctx.mount_user(1, 0.0).await;
    mount_wallet(&ctx, "0", None).await;
    ctx.get_json("/cart/usuario/1/jogos", json!([])).await;
    ctx.get_json("/library/usuario/1/jogos", json!([])).await;
    ctx.get_json("/compras/usuario/1", json!([])).await;
    ctx.get_json("/jogo/4", jogo_json(4, "Tile Tactics", 4.99)).await;
    Mock::given(method("POST"))
        .and(path("/cart/usuario/1/jogos"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&ctx.server)
        .await;

    ctx.login(1).await;
    let item = ctx.store.catalog().get(ItemId::new(4)).await.unwrap();
    ctx.store.cart().add_to_cart(&item).await.unwrap();
    ctx.store.cart().add_to_cart(&item).await.unwrap();

    assert_eq!(ctx.store.cart().len().await, 1);
    let titles: Vec<String> = ctx.notices.drain().into_iter().map(|n| n.title).collect();
    assert!(titles.contains(&"Added to cart".to_string()));
    assert!(titles.contains(&"Already in cart".to_string()));
}

#[tokio::test]
async fn test_checkout_without_identity_suggests_login() {
    let ctx = TestContext::new().await;
    let err = ctx.store.checkout().checkout().await.unwrap_err();
    assert!(matches!(err, CheckoutError::NotAuthenticated));
    assert_eq!(err.route(), Some(Route::Login));
}
