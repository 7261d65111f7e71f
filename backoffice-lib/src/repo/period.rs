//! Time-bounded query scopes

use chrono::DateTime;
use chrono::Duration;
use chrono::SecondsFormat;
use chrono::Utc;

use crate::cache::CacheKey;
use crate::error::Error;
use crate::store::Filter;

/// A half-open interval `[start, end)` of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if start >= end {
            return Err(Error::InvalidQuery(format!(
                "period start {start} is not before its end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The period from `before` ago to `after` from `now`.
    pub fn around(now: DateTime<Utc>, before: Duration, after: Duration) -> Result<Self, Error> {
        Self::new(now - before, now + after)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// The cache key of queries scoped to this period.
    pub fn key(&self) -> CacheKey {
        CacheKey::compose([
            self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.end.to_rfc3339_opts(SecondsFormat::Millis, true),
        ])
    }

    /// Rows whose `field` falls inside the period.
    pub fn filter(&self, field: &str) -> Filter {
        Filter::and([Filter::gte(field, self.start), Filter::lt(field, self.end)])
    }

    /// Rows whose `field` is unset or falls anywhere before the period ends.
    pub fn until_end(&self, field: &str) -> Filter {
        Filter::or([Filter::lt(field, self.end), Filter::is_null(field)])
    }
}
