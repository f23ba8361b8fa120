//! Local notifications for finished background jobs.
//!
//! The job tracker schedules a notification when a generation job
//! completes. Scheduling is fire-and-forget: a failure is logged by the
//! caller and never changes the job lifecycle.

pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

pub use self::error::NotificationError;

use crate::types::BackgroundJob;

/// Maximum body length accepted by the platform.
const MAX_BODY_LENGTH: usize = 180;

/// A local notification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNotification {
    /// Request identifier
    pub id: Uuid,
    /// Title line
    pub title: String,
    /// Body text
    pub body: String,
    /// Job that triggered the notification
    pub job_id: Option<String>,
}

impl LocalNotification {
    /// Creates a notification with a fresh request id.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            job_id: None,
        }
    }

    /// Creates the notification for a successfully finished job.
    pub fn job_complete(job: &BackgroundJob) -> Self {
        Self {
            job_id: Some(job.id.clone()),
            ..Self::new(
                job.job_type.completion_title(),
                "Open the app to see your workouts.",
            )
        }
    }

    /// Validates title and body.
    pub fn validate(&self) -> Result<(), NotificationError> {
        if self.title.trim().is_empty() {
            return Err(NotificationError::InvalidContent("empty title".to_string()));
        }
        if self.body.chars().count() > MAX_BODY_LENGTH {
            return Err(NotificationError::InvalidContent(format!(
                "body longer than {} characters",
                MAX_BODY_LENGTH
            )));
        }
        Ok(())
    }
}

/// Schedules local notifications on the device.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Schedules a notification for immediate delivery.
    async fn schedule(&self, notification: &LocalNotification) -> Result<(), NotificationError>;

    /// Returns true if notifications can be delivered.
    fn is_available(&self) -> bool;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock scheduler for testing.
#[derive(Debug)]
pub struct MockNotificationScheduler {
    scheduled: Mutex<Vec<LocalNotification>>,
    attempts: Mutex<usize>,
    available: AtomicBool,
    should_fail: AtomicBool,
}

impl MockNotificationScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scheduled: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            available: AtomicBool::new(true),
            should_fail: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Notifications successfully scheduled.
    #[must_use]
    pub fn scheduled(&self) -> Vec<LocalNotification> {
        lock(&self.scheduled).clone()
    }

    /// Number of schedule calls, including failed ones.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        *lock(&self.attempts)
    }

    pub fn clear_recorded(&self) {
        lock(&self.scheduled).clear();
        *lock(&self.attempts) = 0;
    }
}

impl Default for MockNotificationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationScheduler for MockNotificationScheduler {
    async fn schedule(&self, notification: &LocalNotification) -> Result<(), NotificationError> {
        *lock(&self.attempts) += 1;

        if !self.is_available() {
            return Err(NotificationError::NotAvailable);
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::ScheduleFailed("Mock failure".to_string()));
        }
        notification.validate()?;

        lock(&self.scheduled).push(notification.clone());
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
