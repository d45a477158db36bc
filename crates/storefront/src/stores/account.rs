//! Profile and password changes for the signed-in identity.

use std::sync::Arc;

use tracing::instrument;

use arcade_core::{Email, Identity};

use crate::error::{Result, StoreError, user_message};
use crate::notice::{Notice, NoticeSink, Route};
use crate::session::SessionStore;

/// Shortest password accepted on change.
pub const MIN_PASSWORD_LEN: usize = 6;

pub struct AccountService {
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
}

impl AccountService {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self { session, notices }
    }

    async fn require_identity(&self) -> Result<Identity> {
        match self.session.current().await {
            Some(identity) => Ok(identity),
            None => {
                self.notices.notify(
                    Notice::error("Sign in required", "You need to sign in to manage your account.")
                        .with_action(Route::Login),
                );
                Err(StoreError::NotAuthenticated)
            }
        }
    }

    /// Change the display name and/or email.
    ///
    /// The wallet balance is kept from the local snapshot; the backend's
    /// copy of it may lag behind.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without an identity, a validation error
    /// when nothing changes or the email is malformed, or the backend's
    /// error.
    #[instrument(skip(self))]
    pub async fn update_profile(
        &self,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Identity> {
        let current = self.require_identity().await?;
        let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(Email::parse)
            .transpose()?;
        if display_name.is_none() && email.is_none() {
            return Err(StoreError::Validation("Nothing to update".to_string()));
        }

        let updated = match self
            .session
            .api()
            .update_user(current.id, display_name, email.as_ref().map(Email::as_str))
            .await
        {
            Ok(identity) => identity.with_balance(current.balance),
            Err(e) => {
                let err = StoreError::from(e);
                err.report("account.update_profile");
                self.notices.notify(Notice::error(
                    "Error",
                    user_message(&err, "Could not update your profile."),
                ));
                return Err(err);
            }
        };
        self.session.update_identity(updated.clone()).await?;
        self.notices.notify(Notice::info(
            "Profile updated",
            "Your account details were saved.",
        ));
        Ok(updated)
    }

    /// Change the password.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without an identity, a validation error
    /// for a short or unchanged password, or the backend's error.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        let identity = self.require_identity().await?;
        if current_password.is_empty() {
            return Err(StoreError::Validation(
                "Current password is required".to_string(),
            ));
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(StoreError::Validation(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if new_password == current_password {
            return Err(StoreError::Validation(
                "New password must differ from the current one".to_string(),
            ));
        }

        if let Err(e) = self
            .session
            .api()
            .change_password(identity.id, current_password, new_password)
            .await
        {
            let err = StoreError::from(e);
            err.report("account.change_password");
            self.notices.notify(Notice::error(
                "Error",
                user_message(&err, "Could not change your password."),
            ));
            return Err(err);
        }
        self.notices.notify(Notice::info(
            "Password changed",
            "Use your new password next time you sign in.",
        ));
        Ok(())
    }
}
