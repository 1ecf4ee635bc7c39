//! Gate in front of the CRM notification channel.
//!
//! Each send goes through four steps:
//! 1. circuit breaker check; an open breaker means the notification is skipped
//! 2. a concurrency permit, held by an RAII guard and released on every exit path
//! 3. the send itself, bounded by the configured timeout
//! 4. recording the tagged outcome back into the breaker
//!
//! Nothing in here returns an error to the caller. A failed or skipped
//! notification never holds up call tracking.

use crate::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::error::notify::NotifyError;
use crate::status::StatusBoard;

use models::Notification;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::time::timeout as TokioTimeout;

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT_NOTIFICATIONS: usize = 4;

/// Where notifications end up.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sink used when no CRM is configured: the notification is only logged.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            "[{}] call {} {:?} {} contact='{}'",
            notification.kind,
            notification.call_id,
            notification.direction,
            notification.state,
            notification.contact_name
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    /// The CRM answered and refused the event.
    Rejected,
    Failed,
    /// Breaker open, nothing was attempted.
    Skipped,
}

pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    breaker: Arc<CircuitBreaker>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    status: Option<Arc<StatusBoard>>,
}

impl Notifier {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        breaker: Arc<CircuitBreaker>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            sink,
            breaker,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
            status: None,
        }
    }

    /// Report CRM availability to `status` after every attempt.
    pub fn with_status(mut self, status: Arc<StatusBoard>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Sends that could start right now without waiting.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn notify(&self, notification: &Notification) -> NotifyOutcome {
        if !self.breaker.is_operation_allowed() {
            info!(
                "Circuit '{}' open, skipping {} for call {}",
                self.breaker.name(),
                notification.kind,
                notification.call_id
            );
            return NotifyOutcome::Skipped;
        }

        let outcome = match self.send_with_permit(notification).await {
            Ok(()) => {
                debug!(
                    "Delivered {} for call {}",
                    notification.kind, notification.call_id
                );
                self.breaker.record_success();
                NotifyOutcome::Delivered
            }
            Err(error) if !error.trips_breaker() => {
                warn!(
                    "CRM refused {} for call {}: {error}",
                    notification.kind, notification.call_id
                );
                self.breaker.record_success();
                NotifyOutcome::Rejected
            }
            Err(error) => {
                warn!(
                    "Failed to deliver {} for call {} ({}): {error}",
                    notification.kind,
                    notification.call_id,
                    error.error_category()
                );
                self.breaker.record_failure();
                NotifyOutcome::Failed
            }
        };

        if let Some(status) = &self.status {
            status.set_crm_available(self.breaker.state() != BreakerState::Open);
        }

        outcome
    }

    async fn send_with_permit(&self, notification: &Notification) -> Result<(), NotifyError> {
        // Dropped on return, timeout or cancellation alike.
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| NotifyError::unavailable(format!("Notification permits closed: {e}")))?;

        match TokioTimeout(self.timeout, self.sink.send(notification)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::timeout(self.timeout)),
        }
    }
}
