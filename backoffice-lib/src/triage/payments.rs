//! Payment triage windows

use std::fmt;

use chrono::Duration;
use serde::Deserialize;
use serde::Serialize;

use super::Classifier;
use crate::error::Error;

/// Where a payment stands relative to the end of its service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentWindow {
    /// Less than a day since the service ended.
    DueTomorrow,
    /// Between one and two days since the service ended.
    DueToday,
    /// Two days or more since the service ended.
    Overdue,
}

impl PaymentWindow {
    pub const ALL: [PaymentWindow; 3] = [Self::DueTomorrow, Self::DueToday, Self::Overdue];

    pub fn label(&self) -> &'static str {
        match self {
            Self::DueTomorrow => "due tomorrow",
            Self::DueToday => "due today",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for PaymentWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Offsets after the end of service at which a payment moves window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentWindows {
    /// Default: 24 hours
    pub due_today_after: Duration,
    /// Default: 48 hours
    pub overdue_after: Duration,
}

impl Default for PaymentWindows {
    fn default() -> Self {
        Self {
            due_today_after: Duration::hours(24),
            overdue_after: Duration::hours(48),
        }
    }
}

impl PaymentWindows {
    pub fn new(due_today_after: Duration, overdue_after: Duration) -> Result<Self, Error> {
        let windows = Self {
            due_today_after,
            overdue_after,
        };
        windows.validate()?;
        Ok(windows)
    }

    /// Rejects negative offsets and an overdue offset before the due-today one.
    pub fn validate(&self) -> Result<(), Error> {
        if self.due_today_after < Duration::zero() || self.overdue_after <= self.due_today_after {
            return Err(Error::Config(format!(
                "payment windows must satisfy 0 <= due today ({}) < overdue ({})",
                self.due_today_after, self.overdue_after
            )));
        }
        Ok(())
    }

    pub fn classifier(&self) -> Classifier<PaymentWindow> {
        Classifier::new(PaymentWindow::DueTomorrow)
            .threshold(self.due_today_after, PaymentWindow::DueToday)
            .threshold(self.overdue_after, PaymentWindow::Overdue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use chrono::TimeZone;
    use chrono::Utc;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_default_windows() {
        let classifier = PaymentWindows::default().classifier();
        let window = |hours: i64| *classifier.bucket_for(reference(), reference() + Duration::hours(hours));

        assert_eq!(window(0), PaymentWindow::DueTomorrow);
        assert_eq!(window(23), PaymentWindow::DueTomorrow);
        assert_eq!(window(24), PaymentWindow::DueToday);
        assert_eq!(window(25), PaymentWindow::DueToday);
        assert_eq!(window(47), PaymentWindow::DueToday);
        assert_eq!(window(48), PaymentWindow::Overdue);
        assert_eq!(window(24 * 30), PaymentWindow::Overdue);
    }

    #[test]
    fn test_one_minute_before_boundary() {
        let classifier = PaymentWindows::default().classifier();
        let now = reference() + Duration::hours(24) - Duration::minutes(1);
        assert_eq!(*classifier.bucket_for(reference(), now), PaymentWindow::DueTomorrow);
    }

    #[test]
    fn test_custom_windows() {
        let windows = PaymentWindows::new(Duration::hours(12), Duration::hours(36)).unwrap();
        let classifier = windows.classifier();
        let now = reference() + Duration::hours(13);
        assert_eq!(*classifier.bucket_for(reference(), now), PaymentWindow::DueToday);
    }

    #[test]
    fn test_inverted_windows_are_rejected() {
        assert!(PaymentWindows::new(Duration::hours(48), Duration::hours(24)).is_err());
        assert!(PaymentWindows::new(Duration::hours(-1), Duration::hours(24)).is_err());
    }
}
