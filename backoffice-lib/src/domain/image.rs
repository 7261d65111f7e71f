use super::Entity;
use crate::listing::ListSpec;
use crate::model::Record;
use crate::store::OrderBy;

/// A photo awaiting (or past) verification.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset(Record);

impl ImageAsset {
    /// Object path inside the storage bucket.
    pub fn path(&self) -> Option<&str> {
        self.0.text("path")
    }

    pub fn fliiinker_id(&self) -> Option<String> {
        self.0.get("fliiinker_id").and_then(|v| v.as_text())
    }

    /// Verification status; absent means pending.
    pub fn status(&self) -> &str {
        self.0.text("status").unwrap_or("pending")
    }
}

impl Entity for ImageAsset {
    const TABLE: &'static str = "images";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn list_spec() -> ListSpec {
        ListSpec::new(Self::TABLE)
            .status_field("status")
            .order(OrderBy::asc("created_at"))
    }
}
