//! Payment triage

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;

use super::BlastRadius;
use super::Invalidate;
use super::Period;
use crate::cache::Clock;
use crate::cache::KeyedCache;
use crate::domain::Entity;
use crate::domain::Payment;
use crate::error::Error;
use crate::model::Record;
use crate::response::Response;
use crate::store::OrderBy;
use crate::store::RemoteStore;
use crate::store::Select;
use crate::triage::Classification;
use crate::triage::PaymentWindow;
use crate::triage::PaymentWindows;

/// Outstanding payments, cached per period and triaged into windows.
#[derive(Clone)]
pub struct PaymentsRepo {
    store: Arc<dyn RemoteStore>,
    periods: KeyedCache<Vec<Record>>,
    ttl: Duration,
    windows: PaymentWindows,
    clock: Arc<dyn Clock>,
}

impl PaymentsRepo {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        periods: KeyedCache<Vec<Record>>,
        ttl: Duration,
        windows: PaymentWindows,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            periods,
            ttl,
            windows,
            clock,
        }
    }

    pub fn windows(&self) -> &PaymentWindows {
        &self.windows
    }

    /// Unpaid payments whose service ended before `period` closes, earliest
    /// first, then those with no service end date.
    ///
    /// Old debts are never cut off by the start of the period.
    pub async fn outstanding(&self, period: &Period) -> Result<Response<Vec<Payment>>, Error> {
        let select = Select::from(Payment::TABLE)
            .filter(period.until_end("service_end_date"))
            .filter(Payment::outstanding_filter())
            .order(OrderBy::asc("service_end_date"));
        let store = Arc::clone(&self.store);

        let rows = self
            .periods
            .get_or_fetch(period.key(), self.ttl, move || async move {
                Ok(store.select(&select).await?.records)
            })
            .await?;
        Ok(rows.map(|rows| rows.into_iter().map(Payment::from_record).collect()))
    }

    /// Classifies the outstanding payments of `period` against the current time.
    ///
    /// The classification is recomputed on every call, including when the
    /// rows come from cache.
    pub async fn triage(&self, period: &Period) -> Result<Response<Classification<PaymentWindow, Payment>>, Error> {
        let payments = self.outstanding(period).await?;
        let classifier = self.windows.classifier();
        Ok(payments.map(|payments| classifier.classify_now(payments, self.clock.as_ref())))
    }

    pub async fn update(&self, id: &str, patch: &Record) -> Result<Payment, Error> {
        let row = self.store.update(Payment::TABLE, id, patch).await?;
        self.invalidate(&BlastRadius::record(Payment::TABLE, id)).await?;
        Ok(Payment::from_record(row))
    }

    /// Records a payment as paid now.
    pub async fn mark_paid(&self, id: &str) -> Result<Payment, Error> {
        let paid_at = self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let patch = Record::new().set("status", "paid").set("paid_at", paid_at);
        self.update(id, &patch).await
    }
}

#[async_trait]
impl Invalidate for PaymentsRepo {
    async fn invalidate(&self, radius: &BlastRadius) -> Result<(), Error> {
        // Any payment may belong to any cached period.
        if radius.table == Payment::TABLE {
            if radius.is_expiry() {
                self.periods.expire_all();
            } else {
                self.periods.invalidate_all();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::store::InMemoryStore;
    use chrono::DateTime;
    use chrono::TimeZone;
    use chrono::Utc;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn setup() -> (InMemoryStore, ManualClock, PaymentsRepo) {
        let store = InMemoryStore::new();
        store.seed(
            "payments",
            [
                Record::new().set("id", "p-1").set("service_end_date", at(1, 0)),
                Record::new().set("id", "p-2").set("service_end_date", at(2, 12)),
                Record::new().set("id", "p-3").set("service_end_date", at(3, 0)),
                Record::new().set("id", "p-4"),
                Record::new().set("id", "p-5").set("service_end_date", at(1, 0)).set("status", "paid"),
            ],
        );
        let clock = ManualClock::new(at(3, 1));
        let repo = PaymentsRepo::new(
            Arc::new(store.clone()),
            KeyedCache::new("payments"),
            Duration::from_secs(300),
            PaymentWindows::default(),
            Arc::new(clock.clone()),
        );
        (store, clock, repo)
    }

    #[tokio::test]
    async fn test_triage_windows() {
        let (_, _, repo) = setup();
        let period = Period::new(at(1, 0), at(8, 0)).unwrap();

        let triage = repo.triage(&period).await.unwrap().into_inner();
        let ids = |window| -> Vec<String> { triage.get(&window).iter().filter_map(|p| p.id()).collect() };

        assert_eq!(ids(PaymentWindow::Overdue), ["p-1"]);
        assert_eq!(ids(PaymentWindow::DueTomorrow), ["p-2", "p-3"]);
        assert!(ids(PaymentWindow::DueToday).is_empty());
        let unscheduled: Vec<String> = triage.unscheduled.iter().filter_map(|p| p.id()).collect();
        assert_eq!(unscheduled, ["p-4"]);
    }

    #[tokio::test]
    async fn test_old_debts_stay_overdue() {
        let (store, _, repo) = setup();
        store.seed(
            "payments",
            [Record::new().set("id", "p-old").set("service_end_date", Utc.with_ymd_and_hms(2023, 12, 4, 0, 0, 0).unwrap())],
        );
        let period = Period::new(at(1, 0), at(8, 0)).unwrap();

        let triage = repo.triage(&period).await.unwrap().into_inner();
        let overdue: Vec<String> = triage.get(&PaymentWindow::Overdue).iter().filter_map(|p| p.id()).collect();

        assert_eq!(overdue, ["p-old", "p-1"]);
    }

    #[tokio::test]
    async fn test_cached_rows_are_reclassified() {
        let (store, clock, repo) = setup();
        let period = Period::new(at(1, 0), at(8, 0)).unwrap();

        repo.triage(&period).await.unwrap();
        clock.advance(chrono::Duration::hours(12));
        let later = repo.triage(&period).await.unwrap();

        assert!(later.is_cached());
        assert_eq!(later.data().count(&PaymentWindow::DueToday), 1);
        assert_eq!(store.stats().selects(), 1);
    }

    #[tokio::test]
    async fn test_mark_paid_drops_periods() {
        let (store, _, repo) = setup();
        let period = Period::new(at(1, 0), at(8, 0)).unwrap();

        repo.triage(&period).await.unwrap();
        let paid = repo.mark_paid("p-1").await.unwrap();
        assert!(paid.is_paid());

        let after = repo.triage(&period).await.unwrap();
        assert!(after.cache.is_miss());
        assert_eq!(after.data().count(&PaymentWindow::Overdue), 0);
        assert_eq!(store.stats().selects(), 2);
    }
}
