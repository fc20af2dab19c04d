use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Informational, e.g. an explicit submit with a too-short query.
    Notice,
    /// The search server could not be reached or answered garbage.
    ConnectionError,
}

/// A user-facing interruption, separate from the inline error text in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub(crate) fn query_too_short(min_chars: usize) -> Self {
        Self {
            kind: AlertKind::Notice,
            title: "Notice".into(),
            message: format!("Search query must be at least {min_chars} characters."),
        }
    }

    pub(crate) fn connection_error(target: &str) -> Self {
        Self {
            kind: AlertKind::ConnectionError,
            title: "Connection error".into(),
            message: format!(
                "Unable to reach the search server.\n\nCheck that it is running: {target}"
            ),
        }
    }
}

pub trait AlertSink: Send + Sync + 'static {
    fn alert(&self, alert: Alert);
}

/// Sends alerts to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn alert(&self, alert: Alert) {
        match alert.kind {
            AlertKind::Notice => warn!(title = %alert.title, "{}", alert.message),
            AlertKind::ConnectionError => error!(title = %alert.title, "{}", alert.message),
        }
    }
}

impl AlertSink for mpsc::UnboundedSender<Alert> {
    fn alert(&self, alert: Alert) {
        if let Err(err) = self.send(alert) {
            LogAlerts.alert(err.0);
        }
    }
}
