use chrono::DateTime;
use chrono::Utc;

use super::Entity;
use super::full_name;
use crate::listing::ListSpec;
use crate::model::Record;
use crate::store::OrderBy;
use crate::triage::Timestamped;

/// An onboarding meeting with a prospective provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Meeting(Record);

impl Meeting {
    /// The attendee's name, then the meeting title, then a placeholder.
    pub fn label(&self) -> String {
        full_name(&self.0)
            .or_else(|| self.0.text("title").map(str::to_string))
            .unwrap_or_else(|| "Meeting".to_string())
    }

    pub fn meeting_date(&self) -> Option<DateTime<Utc>> {
        self.0.timestamp("meeting_date")
    }

    pub fn status(&self) -> Option<&str> {
        self.0.text("status")
    }

    pub fn meeting_url(&self) -> Option<&str> {
        self.0.text("meeting_url")
    }
}

impl Timestamped for Meeting {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.meeting_date()
    }
}

impl Entity for Meeting {
    const TABLE: &'static str = "meetings";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn list_spec() -> ListSpec {
        ListSpec::new(Self::TABLE)
            .search_fields(&["first_name", "last_name", "email", "phone"])
            .status_field("status")
            .order(OrderBy::asc("meeting_date"))
    }
}
