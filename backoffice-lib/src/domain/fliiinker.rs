use super::Entity;
use super::full_name;
use crate::listing::ListSpec;
use crate::model::Record;
use crate::store::OrderBy;

/// A service provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Fliiinker(Record);

impl Fliiinker {
    pub fn display_name(&self) -> String {
        full_name(&self.0)
            .or_else(|| self.email().map(str::to_string))
            .unwrap_or_else(|| "Unnamed fliiinker".to_string())
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

    /// Whether the provider passed verification. Absent means not yet.
    pub fn is_validated(&self) -> bool {
        self.0.get_bool("is_validated").ok().flatten().unwrap_or(false)
    }

    /// Storage path of the profile picture.
    pub fn avatar_path(&self) -> Option<&str> {
        self.0.text("avatar")
    }

    /// Average customer rating, if any ratings exist.
    pub fn rating(&self) -> Option<f64> {
        self.0.get_f64("rating").ok().flatten()
    }
}

impl Entity for Fliiinker {
    const TABLE: &'static str = "fliiinkers";

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_defaults_to_false() {
        assert!(!Fliiinker::from_record(Record::new()).is_validated());
        assert!(Fliiinker::from_record(Record::new().set("is_validated", true)).is_validated());
    }

    #[test]
    fn test_rating_accepts_text() {
        let fliiinker = Fliiinker::from_record(Record::new().set("rating", "4.5"));
        assert_eq!(fliiinker.rating(), Some(4.5));
    }
}
