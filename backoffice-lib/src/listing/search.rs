//! Free-text search terms

use std::fmt;

use crate::store::Filter;

/// A parsed free-text search.
///
/// The input is lower-cased and split on whitespace, and `*` is removed since
/// the gateway would read it as a wildcard. A row matches when
/// every word appears, case-insensitively, as a substring of at least one of
/// the searched fields.
///
/// ```
/// use backoffice_lib::listing::SearchTerm;
///
/// let term = SearchTerm::parse("  Jean   DUPONT ");
/// assert_eq!(term.words(), ["jean", "dupont"]);
/// assert_eq!(term.to_string(), "jean dupont");
/// assert!(SearchTerm::parse("   ").is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchTerm {
    words: Vec<String>,
}

impl SearchTerm {
    /// Parses raw user input.
    pub fn parse(input: &str) -> Self {
        Self {
            words: input
                .split_whitespace()
                .map(|word| word.replace('*', "").to_lowercase())
                .filter(|word| !word.is_empty())
                .collect(),
        }
    }

    /// Returns the normalized words.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Returns `true` if the input held no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Builds the AND-of-OR filter over `fields`.
    ///
    /// Returns `None` for an empty search or when there is nothing to search in.
    pub fn to_filter<S: AsRef<str>>(&self, fields: &[S]) -> Option<Filter> {
        if self.words.is_empty() || fields.is_empty() {
            return None;
        }

        let mut groups = self.words.iter().map(|word| {
            Filter::or(
                fields
                    .iter()
                    .map(|field| Filter::ilike(field.as_ref(), word.as_str())),
            )
        });

        if self.words.len() == 1 {
            groups.next()
        } else {
            Some(Filter::and(groups))
        }
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    const FIELDS: [&str; 4] = ["first_name", "last_name", "email", "phone"];

    fn person(first: &str, last: &str, email: &str) -> Record {
        Record::new()
            .set("first_name", first)
            .set("last_name", last)
            .set("email", email)
            .set("phone", "+33 6 12 34 56 78")
    }

    #[test]
    fn test_every_word_must_match_some_field() {
        let filter = SearchTerm::parse("jean dupont").to_filter(&FIELDS).unwrap();

        assert!(filter.matches(&person("Jean", "Dupont", "jd@example.com")));
        assert!(!filter.matches(&person("Jean", "Martin", "jm@example.com")));
        assert!(!filter.matches(&person("Paul", "Dupont", "pd@example.com")));
    }

    #[test]
    fn test_words_may_match_different_fields() {
        let filter = SearchTerm::parse("jean example.org").to_filter(&FIELDS).unwrap();

        assert!(filter.matches(&person("Jean", "Dupont", "jean@example.org")));
        assert!(!filter.matches(&person("Jean", "Dupont", "jean@example.com")));
    }

    #[test]
    fn test_single_word_is_a_plain_or() {
        let filter = SearchTerm::parse("Dup").to_filter(&FIELDS).unwrap();
        assert!(matches!(&filter, Filter::Or(fields) if fields.len() == 4));
        assert!(filter.matches(&person("Jean", "Dupont", "jd@example.com")));
    }

    #[test]
    fn test_star_is_not_a_wildcard() {
        let term = SearchTerm::parse("dup*nt *** jean*");
        assert_eq!(term.words(), ["dupnt", "jean"]);

        let filter = SearchTerm::parse("jean*").to_filter(&FIELDS).unwrap();
        assert!(filter.matches(&person("Jean", "Dupont", "jd@example.com")));
        assert!(SearchTerm::parse("*").is_empty());
    }

    #[test]
    fn test_blank_search_has_no_filter() {
        assert_eq!(SearchTerm::parse("").to_filter(&FIELDS), None);
        assert_eq!(SearchTerm::parse(" \t\n").to_filter(&FIELDS), None);
        assert_eq!(SearchTerm::parse("jean").to_filter::<&str>(&[]), None);
    }
}
