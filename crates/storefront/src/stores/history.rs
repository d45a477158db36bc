//! Purchase history.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use arcade_core::{Identity, Purchase, PurchaseId, UserId};

use crate::error::{Result, StoreError, user_message};
use crate::notice::{Notice, NoticeSink};
use crate::session::{IdentityListener, SessionStore};

use super::LoadingGuard;

/// The signed-in identity's purchase records, newest first.
pub struct HistoryStore {
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
    purchases: RwLock<Vec<Purchase>>,
    loading: AtomicBool,
}

impl HistoryStore {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            session,
            notices,
            purchases: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
        }
    }

    pub async fn purchases(&self) -> Vec<Purchase> {
        self.purchases.read().await.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Refetch the purchase records.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the current records are kept.
    pub async fn refresh(&self) -> Result<()> {
        let user = self.session.current_id().await;
        self.load(user).await
    }

    async fn load(&self, user: Option<UserId>) -> Result<()> {
        let Some(user) = user else {
            self.purchases.write().await.clear();
            return Ok(());
        };
        let _loading = LoadingGuard::start(&self.loading);
        match self.session.api().list_purchases(user).await {
            Ok(mut purchases) => {
                purchases.sort_by(|a, b| {
                    b.purchased_at
                        .cmp(&a.purchased_at)
                        .then_with(|| b.id.cmp(&a.id))
                });
                *self.purchases.write().await = purchases;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to load purchases");
                Err(e.into())
            }
        }
    }

    /// Fetch one purchase record from the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn get(&self, id: PurchaseId) -> Result<Purchase> {
        Ok(self.session.api().get_purchase(id).await?)
    }

    /// Refund a purchase and flag the local record.
    ///
    /// The rest of the client state (wallet, library) is not adjusted here;
    /// the caller reloads it.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without an identity, a validation error
    /// for an already refunded record, or the backend's error.
    #[instrument(skip(self), fields(purchase_id = %id))]
    pub async fn refund(&self, id: PurchaseId) -> Result<()> {
        if !self.session.is_authenticated().await {
            return Err(StoreError::NotAuthenticated);
        }
        let already = self
            .purchases
            .read()
            .await
            .iter()
            .any(|p| p.id == id && p.is_refunded());
        if already {
            return Err(StoreError::Validation(
                "This purchase was already refunded".to_string(),
            ));
        }

        if let Err(e) = self.session.api().refund(id).await {
            let err = StoreError::from(e);
            err.report("purchases.refund");
            self.notices.notify(Notice::error(
                "Refund failed",
                user_message(&err, "Could not request the refund."),
            ));
            return Err(err);
        }

        if let Some(purchase) = self.purchases.write().await.iter_mut().find(|p| p.id == id) {
            purchase.mark_refunded();
        }
        self.notices.notify(Notice::info(
            "Refund requested",
            "The purchase was refunded to your wallet.",
        ));
        Ok(())
    }
}

#[async_trait]
impl IdentityListener for HistoryStore {
    async fn on_identity_changed(&self, identity: Option<&Identity>) {
        let _ = self.load(identity.map(|i| i.id)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::test_support::Harness;

    #[tokio::test]
    async fn test_refund_marks_record() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/compras/usuario/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "usuarioId": 1, "valor": 20.0, "dataCompra": "2024-01-02T10:00:00"},
                {"id": 2, "usuarioId": 1, "valor": 35.0, "dataCompra": "2024-03-02T10:00:00"},
            ])))
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/compras/1/reembolso"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&h.server)
            .await;
        let history = Arc::new(HistoryStore::new(h.session.clone(), h.notices.clone()));
        h.session.subscribe(&history);
        h.login(1, 0.0).await;

        let purchases = history.purchases().await;
        assert_eq!(purchases[0].id, PurchaseId::new(2));

        history.refund(PurchaseId::new(1)).await.unwrap();
        let refunded = history.purchases().await;
        assert!(refunded.iter().any(|p| p.id == PurchaseId::new(1) && p.is_refunded()));

        let err = history.refund(PurchaseId::new(1)).await.unwrap_err();
        assert!(err.is_validation());
    }
}
