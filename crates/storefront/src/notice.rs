//! Transient user-facing notices.
//!
//! Stores report outcomes ("Item added", "Insufficient balance", ...) through
//! a [`NoticeSink`] rather than printing them, so the front end decides how
//! they are shown.

use std::sync::Mutex;

/// Where the user could go next in response to a notice or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Sign-in screen.
    Login,
    /// Account page, where the wallet is topped up.
    Account,
    /// Purchased items.
    Library,
    /// The cart.
    Cart,
}

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    /// Suggested follow-up, e.g. "top up" after an insufficient-balance notice.
    pub action: Option<Route>,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
            action: None,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
            action: None,
        }
    }

    #[must_use]
    pub const fn with_action(mut self, route: Route) -> Self {
        self.action = Some(route);
        self
    }
}

/// Receives notices from the stores.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotices;

impl NoticeSink for TracingNotices {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => {
                tracing::info!(title = %notice.title, "{}", notice.message);
            }
            NoticeLevel::Error => {
                tracing::warn!(title = %notice.title, "{}", notice.message);
            }
        }
    }
}

/// Sink that keeps notices until they are drained.
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every notice received so far.
    pub fn drain(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }

    /// Copy of the notices received so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl NoticeSink for NoticeLog {
    fn notify(&self, notice: Notice) {
        tracing::debug!(title = %notice.title, message = %notice.message, "Notice queued");
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_log_drains() {
        let log = NoticeLog::new();
        log.notify(Notice::info("Item added", "Hollow Depths was added to your cart."));
        log.notify(
            Notice::error("Insufficient balance", "Top up first.").with_action(Route::Account),
        );

        assert_eq!(log.snapshot().len(), 2);
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].action, Some(Route::Account));
        assert!(log.drain().is_empty());
    }
}
