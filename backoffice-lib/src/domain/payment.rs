use chrono::DateTime;
use chrono::Utc;

use super::Entity;
use crate::listing::ListSpec;
use crate::model::Record;
use crate::store::Filter;
use crate::store::OrderBy;
use crate::triage::Timestamped;

/// A payout owed to a provider for a completed service.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment(Record);

impl Payment {
    pub fn amount(&self) -> Option<f64> {
        self.0.get_f64("amount").ok().flatten()
    }

    pub fn status(&self) -> Option<&str> {
        self.0.text("status")
    }

    pub fn fliiinker_id(&self) -> Option<String> {
        self.0.get("fliiinker_id").and_then(|v| v.as_text())
    }

    pub fn order_id(&self) -> Option<String> {
        self.0.get("order_id").and_then(|v| v.as_text())
    }

    /// When the paid-for service ended. Payment windows are measured from here.
    pub fn service_end_date(&self) -> Option<DateTime<Utc>> {
        self.0.timestamp("service_end_date")
    }

    pub fn is_paid(&self) -> bool {
        self.status().is_some_and(|s| s.eq_ignore_ascii_case("paid"))
    }

    /// Matches payments not yet marked paid.
    pub fn outstanding_filter() -> Filter {
        Filter::or([Filter::is_null("status"), Filter::neq("status", "paid")])
    }
}

impl Timestamped for Payment {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.service_end_date()
    }
}

impl Entity for Payment {
    const TABLE: &'static str = "payments";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn list_spec() -> ListSpec {
        ListSpec::new(Self::TABLE)
            .status_field("status")
            .order(OrderBy::asc("service_end_date"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reference_time_is_service_end() {
        let payment = Payment::from_record(Record::new().set("service_end_date", "2024-01-01 00:00:00+00"));
        assert_eq!(
            payment.reference_time(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(Payment::from_record(Record::new()).reference_time(), None);
    }

    #[test]
    fn test_outstanding() {
        let filter = Payment::outstanding_filter();
        assert!(filter.matches(&Record::new().set("status", "pending")));
        assert!(filter.matches(&Record::new()));
        assert!(!filter.matches(&Record::new().set("status", "paid")));
    }
}
