use chrono::DateTime;
use chrono::Utc;

use super::Entity;
use super::full_name;
use crate::listing::ListSpec;
use crate::model::Record;
use crate::store::OrderBy;

/// A marketplace customer.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer(Record);

impl Customer {
    /// Full name, then email, then a placeholder.
    pub fn display_name(&self) -> String {
        full_name(&self.0)
            .or_else(|| self.email().map(str::to_string))
            .unwrap_or_else(|| "Unnamed customer".to_string())
    }

    pub fn email(&self) -> Option<&str> {
        self.0.text("email")
    }

    pub fn phone(&self) -> Option<&str> {
        self.0.text("phone")
    }

    pub fn status(&self) -> Option<&str> {
        self.0.text("status")
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.0.timestamp("created_at")
    }
}

impl Entity for Customer {
    const TABLE: &'static str = "customers";

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
            .order(OrderBy::desc("created_at"))
    }
}
