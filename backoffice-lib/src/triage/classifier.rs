//! Time-window classification

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::cache::Clock;

/// Something with the point in time a classifier measures from.
pub trait Timestamped {
    /// Returns the reference time, or `None` if the record has none.
    fn reference_time(&self) -> Option<DateTime<Utc>>;
}

impl<T: Timestamped> Timestamped for &T {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        (*self).reference_time()
    }
}

/// Assigns records to buckets by how long ago their reference time was.
///
/// A record lands in the bucket of the last threshold whose offset has
/// elapsed (`now - reference >= offset`), or in the initial bucket if none
/// has. Thresholds are kept sorted by offset.
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use backoffice_lib::triage::Classifier;
///
/// let classifier = Classifier::new("fresh")
///     .threshold(Duration::hours(48), "stale")
///     .threshold(Duration::hours(24), "aging");
///
/// let reference = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let now = Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap();
/// assert_eq!(classifier.bucket_for(reference, now), &"aging");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier<B> {
    initial: B,
    thresholds: Vec<(Duration, B)>,
}

impl<B> Classifier<B> {
    /// Creates a classifier that puts every record in `initial`.
    pub fn new(initial: B) -> Self {
        Self {
            initial,
            thresholds: Vec::new(),
        }
    }

    /// Adds a bucket for records at least `offset` past their reference time.
    pub fn threshold(mut self, offset: Duration, bucket: B) -> Self {
        let at = self.thresholds.partition_point(|(existing, _)| *existing <= offset);
        self.thresholds.insert(at, (offset, bucket));
        self
    }

    /// Returns every bucket in threshold order, the initial one first.
    pub fn buckets(&self) -> impl Iterator<Item = &B> {
        std::iter::once(&self.initial).chain(self.thresholds.iter().map(|(_, b)| b))
    }

    /// Returns the bucket for a record with `reference` at `now`.
    pub fn bucket_for(&self, reference: DateTime<Utc>, now: DateTime<Utc>) -> &B {
        let elapsed = now - reference;
        self.thresholds
            .iter()
            .rev()
            .find(|(offset, _)| elapsed >= *offset)
            .map(|(_, bucket)| bucket)
            .unwrap_or(&self.initial)
    }

    fn index_for(&self, reference: DateTime<Utc>, now: DateTime<Utc>) -> usize {
        let elapsed = now - reference;
        self.thresholds.partition_point(|(offset, _)| elapsed >= *offset)
    }
}

impl<B: Clone> Classifier<B> {
    /// Classifies `records` at `now`. The result depends only on the records
    /// and `now`.
    pub fn classify<R, I>(&self, records: I, now: DateTime<Utc>) -> Classification<B, R>
    where
        R: Timestamped,
        I: IntoIterator<Item = R>,
    {
        let mut buckets: Vec<(B, Vec<R>)> = self.buckets().map(|b| (b.clone(), Vec::new())).collect();
        let mut unscheduled = Vec::new();

        for record in records {
            match record.reference_time() {
                Some(reference) => buckets[self.index_for(reference, now)].1.push(record),
                None => unscheduled.push(record),
            }
        }

        Classification {
            now,
            buckets,
            unscheduled,
        }
    }

    /// Classifies `records` against a single reading of `clock`.
    pub fn classify_now<R, I>(&self, records: I, clock: &dyn Clock) -> Classification<B, R>
    where
        R: Timestamped,
        I: IntoIterator<Item = R>,
    {
        self.classify(records, clock.now())
    }
}

/// Records grouped into buckets at one instant.
///
/// Every bucket of the classifier is present, in threshold order, even when
/// empty. Records without a reference time are kept apart in
/// [`unscheduled`](Self::unscheduled).
#[derive(Debug, Clone, PartialEq)]
pub struct Classification<B, R> {
    /// The instant the records were classified at.
    pub now: DateTime<Utc>,
    buckets: Vec<(B, Vec<R>)>,
    /// Records with no reference time.
    pub unscheduled: Vec<R>,
}

impl<B: PartialEq, R> Classification<B, R> {
    /// Returns the records in `bucket`.
    pub fn get(&self, bucket: &B) -> &[R] {
        self.buckets
            .iter()
            .find(|(b, _)| b == bucket)
            .map(|(_, records)| records.as_slice())
            .unwrap_or_default()
    }

    /// Returns the number of records in `bucket`.
    pub fn count(&self, bucket: &B) -> usize {
        self.get(bucket).len()
    }
}

impl<B, R> Classification<B, R> {
    /// Iterates buckets and their records in threshold order.
    pub fn iter(&self) -> impl Iterator<Item = (&B, &[R])> {
        self.buckets.iter().map(|(b, records)| (b, records.as_slice()))
    }

    /// Returns the number of classified records, unscheduled included.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|(_, r)| r.len()).sum::<usize>() + self.unscheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the classification, returning the buckets.
    pub fn into_buckets(self) -> Vec<(B, Vec<R>)> {
        self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(Option<DateTime<Utc>>);

    impl Timestamped for Item {
        fn reference_time(&self) -> Option<DateTime<Utc>> {
            self.0
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap()
    }

    fn classifier() -> Classifier<u8> {
        Classifier::new(0)
            .threshold(Duration::hours(2), 2)
            .threshold(Duration::hours(1), 1)
    }

    #[test]
    fn test_thresholds_are_sorted() {
        assert_eq!(classifier().buckets().copied().collect::<Vec<_>>(), [0, 1, 2]);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let c = classifier();
        assert_eq!(*c.bucket_for(at(10), at(10)), 0);
        assert_eq!(*c.bucket_for(at(10), at(11)), 1);
        assert_eq!(*c.bucket_for(at(10), at(12)), 2);
        // Future references stay in the initial bucket.
        assert_eq!(*c.bucket_for(at(12), at(10)), 0);
    }

    #[test]
    fn test_missing_reference_is_unscheduled() {
        let result = classifier().classify([Item(None), Item(Some(at(8)))], at(12));
        assert_eq!(result.unscheduled, [Item(None)]);
        assert_eq!(result.count(&2), 1);
        assert_eq!(result.count(&0), 0);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let items: Vec<Item> = (1..=12).map(|h| Item(Some(at(h)))).collect();
        let a = classifier().classify(items.iter(), at(12));
        let b = classifier().classify(items.iter(), at(12));
        assert_eq!(
            a.iter().map(|(b, r)| (*b, r.len())).collect::<Vec<_>>(),
            b.iter().map(|(b, r)| (*b, r.len())).collect::<Vec<_>>()
        );
        assert_eq!(a.count(&0), 1);
        assert_eq!(a.count(&1), 1);
        assert_eq!(a.count(&2), 10);
    }
}
