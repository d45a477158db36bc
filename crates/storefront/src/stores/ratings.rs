//! Ratings on owned items.

use std::sync::Arc;

use tracing::instrument;

use arcade_core::{ItemId, Rating, Score};

use crate::error::{Result, StoreError, user_message};
use crate::notice::{Notice, NoticeSink, Route};
use crate::session::SessionStore;

pub struct RatingService {
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
}

impl RatingService {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self { session, notices }
    }

    /// Rate an item from 0 to 5.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without an identity, a score error above
    /// the maximum, or the backend's error (e.g. the item is not owned).
    #[instrument(skip(self, comment), fields(item_id = %item))]
    pub async fn rate(&self, item: ItemId, score: u8, comment: &str) -> Result<Rating> {
        let Some(user) = self.session.current_id().await else {
            self.notices.notify(
                Notice::error("Sign in required", "You need to sign in to rate games.")
                    .with_action(Route::Login),
            );
            return Err(StoreError::NotAuthenticated);
        };
        let score = Score::new(score)?;

        match self
            .session
            .api()
            .create_rating(user, item, score, comment.trim())
            .await
        {
            Ok(rating) => {
                self.notices.notify(Notice::info(
                    "Rating saved",
                    format!("You rated this game {}/{}.", score.get(), Score::MAX),
                ));
                Ok(rating)
            }
            Err(e) => {
                let err = StoreError::from(e);
                err.report("ratings.rate");
                self.notices.notify(Notice::error(
                    "Error",
                    user_message(&err, "Could not save your rating."),
                ));
                Err(err)
            }
        }
    }
}
