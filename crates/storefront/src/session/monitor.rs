//! Idle timeout and periodic session validation.
//!
//! While an identity is signed in, one background task watches for
//! activity and re-validates the session on an interval and on focus. The
//! task is aborted when the identity goes away or the monitor is dropped.
//!
//! Every check belongs to the identity it was started for. Checks run in a
//! `JoinSet` owned by the watch task, so stopping the watch cancels them.
//! Forced sign-out runs detached: signing out notifies this monitor, which
//! aborts the watch task, and that must not cut the sign-out short. It only
//! signs out the identity the check was for.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use arcade_core::{Identity, UserId};

use crate::notice::{Notice, NoticeSink, Route};

use super::{IdentityListener, SessionStore};

/// Kind of user interaction that counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Pointer,
    Keyboard,
    Scroll,
    Touch,
}

/// Events fed to the monitor by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user did something; restarts the idle window.
    Activity(ActivityKind),
    /// The front end regained focus; re-validates the session.
    Focus,
}

struct Watch {
    user: UserId,
    events: mpsc::Sender<SessionEvent>,
    handle: JoinHandle<()>,
}

/// Watches the signed-in session.
pub struct SessionMonitor {
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
    watch: Mutex<Option<Watch>>,
}

impl SessionMonitor {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            session,
            notices,
            watch: Mutex::new(None),
        }
    }

    /// Report user activity.
    pub fn record_activity(&self, kind: ActivityKind) {
        self.send(SessionEvent::Activity(kind));
    }

    /// Report that the front end regained focus.
    pub fn focus(&self) {
        self.send(SessionEvent::Focus);
    }

    /// Whether a watch task is running.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watch
            .lock()
            .map(|w| w.as_ref().is_some_and(|w| !w.handle.is_finished()))
            .unwrap_or(false)
    }

    fn send(&self, event: SessionEvent) {
        if let Ok(watch) = self.watch.lock()
            && let Some(watch) = watch.as_ref()
        {
            // A full queue already holds enough activity to reset the timer.
            let _ = watch.events.try_send(event);
        }
    }

    fn start(&self, user: UserId) {
        let Ok(mut watch) = self.watch.lock() else {
            return;
        };
        if watch.as_ref().is_some_and(|w| w.user == user && !w.handle.is_finished()) {
            return;
        }
        if let Some(old) = watch.take() {
            old.handle.abort();
        }
        let (events, rx) = mpsc::channel(32);
        let handle = tokio::spawn(run(self.session.clone(), self.notices.clone(), user, rx));
        tracing::debug!(user_id = %user, "Session monitor started");
        *watch = Some(Watch {
            user,
            events,
            handle,
        });
    }

    fn stop(&self) {
        if let Ok(mut watch) = self.watch.lock()
            && let Some(old) = watch.take()
        {
            old.handle.abort();
            tracing::debug!(user_id = %old.user, "Session monitor stopped");
        }
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl IdentityListener for SessionMonitor {
    async fn on_identity_changed(&self, identity: Option<&Identity>) {
        match identity {
            Some(identity) => self.start(identity.id),
            None => self.stop(),
        }
    }
}

async fn run(
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
    user: UserId,
    mut events: mpsc::Receiver<SessionEvent>,
) {
    let config = *session.config();
    // The first tick fires immediately, giving the validation on start.
    let mut interval = tokio::time::interval(config.check_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let idle = tokio::time::sleep(config.idle_timeout);
    tokio::pin!(idle);
    // Dropped with this task, which aborts any check still in flight.
    let mut checks = JoinSet::new();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                checks.spawn(check(session.clone(), notices.clone(), user));
            }
            () = &mut idle => {
                tokio::spawn(expire_idle(session, notices, user, config.idle_timeout.as_secs() / 60));
                return;
            }
            Some(_) = checks.join_next() => {}
            event = events.recv() => match event {
                Some(SessionEvent::Activity(_)) => {
                    idle.as_mut().reset(Instant::now() + config.idle_timeout);
                }
                Some(SessionEvent::Focus) => {
                    tracing::debug!(user_id = %user, "Focus regained, checking session");
                    checks.spawn(check(session.clone(), notices.clone(), user));
                }
                None => return,
            },
        }
    }
}

async fn check(session: Arc<SessionStore>, notices: Arc<dyn NoticeSink>, user: UserId) {
    let Some(reason) = session.fault(user).await else {
        return;
    };
    tokio::spawn(async move {
        if session.purge_if(user, reason).await {
            tracing::info!(user_id = %user, reason, "Session no longer valid, signed out");
            notices.notify(
                Notice::error("Session expired", "Your session has expired. Please sign in again.")
                    .with_action(Route::Login),
            );
        }
    });
}

async fn expire_idle(
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
    user: UserId,
    minutes: u64,
) {
    if session.logout_user(user).await {
        tracing::info!(user_id = %user, idle_minutes = minutes, "Idle too long, signed out");
        notices.notify(
            Notice::error(
                "Session inactive",
                format!("You were signed out after {minutes} minutes of inactivity."),
            )
            .with_action(Route::Login),
        );
    }
}
