use chrono::DateTime;
use chrono::Utc;

use super::Entity;
use crate::listing::ListSpec;
use crate::model::Record;
use crate::store::Filter;
use crate::store::OrderBy;

/// Statuses that close a claim.
pub const RESOLVED_STATUSES: [&str; 2] = ["resolved", "closed"];

/// A customer or provider complaint about an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim(Record);

impl Claim {
    pub fn title(&self) -> &str {
        self.0.text("title").unwrap_or("Untitled claim")
    }

    pub fn description(&self) -> Option<&str> {
        self.0.text("description")
    }

    pub fn status(&self) -> Option<&str> {
        self.0.text("status")
    }

    pub fn order_id(&self) -> Option<String> {
        self.0.get("order_id").and_then(|v| v.as_text())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.0.timestamp("created_at")
    }

    /// Returns the chat conversation for this claim: its channel id when
    /// one was assigned, `claim-{id}` otherwise.
    pub fn conversation_id(&self) -> Option<String> {
        match self.0.text("channel_id") {
            Some(channel) => Some(channel.to_string()),
            None => self.id().map(|id| format!("claim-{id}")),
        }
    }

    /// A claim with no status counts as open.
    pub fn is_unresolved(&self) -> bool {
        match self.status() {
            Some(status) => !RESOLVED_STATUSES
                .iter()
                .any(|resolved| status.eq_ignore_ascii_case(resolved)),
            None => true,
        }
    }

    /// Matches the rows [`is_unresolved`](Self::is_unresolved) accepts.
    pub fn unresolved_filter() -> Filter {
        Filter::or([
            Filter::is_null("status"),
            Filter::and(RESOLVED_STATUSES.iter().map(|s| Filter::neq("status", *s))),
        ])
    }
}

impl Entity for Claim {
    const TABLE: &'static str = "claims";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn list_spec() -> ListSpec {
        ListSpec::new(Self::TABLE)
            .search_fields(&["title", "description", "email"])
            .status_field("status")
            .order(OrderBy::desc("created_at"))
    }
}
