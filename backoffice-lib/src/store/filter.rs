//! Row filters for select queries

use std::cmp::Ordering;

use crate::model::Record;
use crate::model::Value;
use crate::model::parse_timestamp;

/// A filter condition for selecting rows.
///
/// Filters combine with `And`/`Or` into arbitrary trees. The REST store
/// renders them as gateway query parameters; the in-memory store evaluates
/// them directly with [`Filter::matches`].
///
/// # Example
///
/// ```
/// use backoffice_lib::store::Filter;
///
/// let filter = Filter::eq("status", "open")
///     .and_also(Filter::or([
///         Filter::ilike("first_name", "jean"),
///         Filter::ilike("email", "jean"),
///     ]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equality: `field = value`
    Eq(String, Value),
    /// Not equal: `field <> value`
    Neq(String, Value),
    /// Greater than: `field > value`
    Gt(String, Value),
    /// Greater than or equal: `field >= value`
    Gte(String, Value),
    /// Less than: `field < value`
    Lt(String, Value),
    /// Less than or equal: `field <= value`
    Lte(String, Value),
    /// Case-insensitive substring match: `field ILIKE '%value%'`
    ILike(String, String),
    /// Is null: `field IS NULL`
    IsNull(String),
    /// Is not null: `field IS NOT NULL`
    IsNotNull(String),
    /// Membership: `field IN (values)`
    In(String, Vec<Value>),
    /// Logical AND of multiple filters. Empty means no constraint.
    And(Vec<Filter>),
    /// Logical OR of multiple filters. Empty means no constraint.
    Or(Vec<Filter>),
}

impl Filter {
    /// Creates an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    /// Creates a not-equal filter.
    pub fn neq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Neq(field.into(), value.into())
    }

    /// Creates a greater-than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    /// Creates a greater-than-or-equal filter.
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(field.into(), value.into())
    }

    /// Creates a less-than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    /// Creates a less-than-or-equal filter.
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(field.into(), value.into())
    }

    /// Creates a case-insensitive substring filter.
    ///
    /// `*` is the gateway's wildcard and cannot be escaped, so it is removed
    /// from `needle` here for every store alike.
    pub fn ilike(field: impl Into<String>, needle: impl Into<String>) -> Self {
        let needle: String = needle.into();
        Filter::ILike(field.into(), needle.replace('*', ""))
    }

    /// Creates an is-null filter.
    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }

    /// Creates an is-not-null filter.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Filter::IsNotNull(field.into())
    }

    /// Creates a membership filter.
    pub fn in_list<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Creates a logical AND of multiple filters.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// Creates a logical OR of multiple filters.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Combines this filter with another using logical AND.
    pub fn and_also(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            _ => Filter::And(vec![self, other]),
        }
    }

    /// Combines this filter with another using logical OR.
    pub fn or_else(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            _ => Filter::Or(vec![self, other]),
        }
    }

    /// Combines two optional filters with AND.
    pub fn both(a: Option<Filter>, b: Option<Filter>) -> Option<Filter> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.and_also(b)),
            (a, b) => a.or(b),
        }
    }

    /// Evaluates this filter against a record.
    ///
    /// Missing fields behave like SQL NULL: they fail every comparison and
    /// satisfy only `IsNull`.
    pub fn matches(&self, record: &Record) -> bool {
        let field = |name: &str| record.get(name).filter(|v| !v.is_null());
        match self {
            Filter::Eq(name, value) => field(name).is_some_and(|v| loose_eq(v, value)),
            Filter::Neq(name, value) => field(name).is_some_and(|v| !loose_eq(v, value)),
            Filter::Gt(name, value) => compare_field(field(name), value) == Some(Ordering::Greater),
            Filter::Gte(name, value) => matches!(
                compare_field(field(name), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(name, value) => compare_field(field(name), value) == Some(Ordering::Less),
            Filter::Lte(name, value) => matches!(
                compare_field(field(name), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::ILike(name, needle) => field(name)
                .and_then(Value::as_text)
                .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase())),
            Filter::IsNull(name) => field(name).is_none(),
            Filter::IsNotNull(name) => field(name).is_some(),
            Filter::In(name, values) => {
                field(name).is_some_and(|v| values.iter().any(|candidate| loose_eq(v, candidate)))
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.is_empty() || filters.iter().any(|f| f.matches(record)),
        }
    }
}

/// Equality that tolerates the gateway's mixed id representations
/// (`7` vs `"7"`).
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.as_text(), b.as_text()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare_field(field: Option<&Value>, value: &Value) -> Option<Ordering> {
    compare_values(field?, value)
}

/// Orders two values the way the database would for the common column
/// types: numbers numerically, timestamps chronologically, text
/// lexicographically.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => match (parse_timestamp(a), parse_timestamp(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Record {
        Record::new()
            .set("id", 7i64)
            .set("first_name", "Jean")
            .set("email", "jean.dupont@example.com")
            .set("phone", Value::Null)
            .set("created_at", "2024-03-01T10:00:00Z")
    }

    #[test]
    fn test_ilike_is_case_insensitive() {
        assert!(Filter::ilike("first_name", "JEAN").matches(&customer()));
        assert!(Filter::ilike("email", "Dupont").matches(&customer()));
        assert!(!Filter::ilike("phone", "06").matches(&customer()));
    }

    #[test]
    fn test_ilike_drops_gateway_wildcard() {
        assert_eq!(Filter::ilike("email", "*dupont*"), Filter::ilike("email", "dupont"));
        assert!(Filter::ilike("email", "jean*dupont").matches(&Record::new().set("email", "jeandupont@x.fr")));
    }

    #[test]
    fn test_null_semantics() {
        let record = customer();
        assert!(Filter::is_null("phone").matches(&record));
        assert!(Filter::is_null("missing").matches(&record));
        assert!(!Filter::neq("phone", "x").matches(&record));
    }

    #[test]
    fn test_id_equality_across_representations() {
        assert!(Filter::eq("id", "7").matches(&customer()));
        assert!(Filter::in_list("id", [1i64, 7]).matches(&customer()));
    }

    #[test]
    fn test_timestamp_comparison() {
        let record = customer();
        assert!(Filter::gte("created_at", "2024-03-01 10:00:00+00").matches(&record));
        assert!(Filter::lt("created_at", "2024-03-02").matches(&record));
    }

    #[test]
    fn test_combinators() {
        let filter = Filter::eq("first_name", "Jean")
            .and_also(Filter::ilike("email", "nobody").or_else(Filter::ilike("email", "dupont")));
        assert!(filter.matches(&customer()));
        assert_eq!(Filter::both(None, Some(Filter::is_null("x"))), Some(Filter::is_null("x")));
    }
}
