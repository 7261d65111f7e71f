//! Onboarding meeting calendar

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::BlastRadius;
use super::Invalidate;
use super::Period;
use crate::cache::Clock;
use crate::cache::KeyedCache;
use crate::domain::Entity;
use crate::domain::Meeting;
use crate::error::Error;
use crate::model::Record;
use crate::response::Response;
use crate::store::OrderBy;
use crate::store::RemoteStore;
use crate::store::Select;
use crate::triage::CalendarConfig;
use crate::triage::WeekView;
use crate::triage::monday_of;

/// Meetings, cached per displayed week.
#[derive(Clone)]
pub struct MeetingsRepo {
    store: Arc<dyn RemoteStore>,
    weeks: KeyedCache<Vec<Record>>,
    ttl: Duration,
    calendar: CalendarConfig,
    clock: Arc<dyn Clock>,
}

impl MeetingsRepo {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        weeks: KeyedCache<Vec<Record>>,
        ttl: Duration,
        calendar: CalendarConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            weeks,
            ttl,
            calendar,
            clock,
        }
    }

    pub fn calendar(&self) -> &CalendarConfig {
        &self.calendar
    }

    /// Lays out the week containing `day` (weeks start on Monday, in the
    /// calendar's display offset).
    pub async fn week(&self, day: NaiveDate) -> Result<Response<WeekView<Meeting>>, Error> {
        let week_start = monday_of(day);
        let (start, end) = self.calendar.week_bounds(week_start);
        let period = Period::new(start, end)?;

        let select = Select::from(Meeting::TABLE)
            .filter(period.filter("meeting_date"))
            .order(OrderBy::asc("meeting_date"));
        let store = Arc::clone(&self.store);

        let rows = self
            .weeks
            .get_or_fetch(period.key(), self.ttl, move || async move {
                Ok(store.select(&select).await?.records)
            })
            .await?;

        let now = self.clock.now();
        Ok(rows.map(|rows| {
            WeekView::build(
                week_start,
                rows.into_iter().map(Meeting::from_record),
                &self.calendar,
                now,
            )
        }))
    }

    /// The week containing the current time.
    pub async fn this_week(&self) -> Result<Response<WeekView<Meeting>>, Error> {
        let today = self.clock.now().with_timezone(&self.calendar.offset).date_naive();
        self.week(today).await
    }

    pub async fn update(&self, id: &str, patch: &Record) -> Result<Meeting, Error> {
        let row = self.store.update(Meeting::TABLE, id, patch).await?;
        self.invalidate(&BlastRadius::record(Meeting::TABLE, id)).await?;
        Ok(Meeting::from_record(row))
    }
}

#[async_trait]
impl Invalidate for MeetingsRepo {
    async fn invalidate(&self, radius: &BlastRadius) -> Result<(), Error> {
        // A rescheduled meeting can leave one week and enter another.
        if radius.table == Meeting::TABLE {
            if radius.is_expiry() {
                self.weeks.expire_all();
            } else {
                self.weeks.invalidate_all();
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
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    fn setup() -> (InMemoryStore, MeetingsRepo) {
        let store = InMemoryStore::new();
        store.seed(
            "meetings",
            [
                Record::new().set("id", "m-1").set("meeting_date", at(5, 9)),
                Record::new().set("id", "m-2").set("meeting_date", at(7, 15)),
                Record::new().set("id", "m-3").set("meeting_date", at(12, 10)),
            ],
        );
        let repo = MeetingsRepo::new(
            Arc::new(store.clone()),
            KeyedCache::new("meetings"),
            Duration::from_secs(300),
            CalendarConfig::default(),
            Arc::new(ManualClock::new(at(6, 11))),
        );
        (store, repo)
    }

    #[tokio::test]
    async fn test_week_only_holds_its_meetings() {
        let (_, repo) = setup();
        let view = repo.this_week().await.unwrap().into_inner();

        assert_eq!(view.week_start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(view.placed(), 2);
        assert_eq!(view.cell(1, 9)[0].id().as_deref(), Some("m-1"));
        assert_eq!(view.now.map(|n| (n.day, n.hour)), Some((2, 11)));
    }

    #[tokio::test]
    async fn test_reschedule_drops_cached_weeks() {
        let (store, repo) = setup();
        let friday = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();

        repo.week(friday).await.unwrap();
        repo.update("m-3", &Record::new().set("meeting_date", at(8, 10)))
            .await
            .unwrap();
        let view = repo.week(friday).await.unwrap();

        assert!(view.cache.is_miss());
        assert_eq!(view.data().placed(), 3);
        assert_eq!(store.stats().selects(), 2);
    }
}
