//! Weekly meeting calendar

use chrono::DateTime;
use chrono::Datelike;
use chrono::Days;
use chrono::FixedOffset;
use chrono::NaiveDate;
use chrono::NaiveTime;
use chrono::Offset;
use chrono::Timelike;
use chrono::Utc;

use super::Timestamped;
use crate::error::Error;

/// Visible hours and display offset of the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarConfig {
    /// First visible hour row, inclusive.
    pub first_hour: u32,
    /// End of the last visible hour row, exclusive.
    pub last_hour: u32,
    /// Offset of the operators' local time from UTC.
    pub offset: FixedOffset,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            first_hour: 8,
            last_hour: 20,
            offset: Utc.fix(),
        }
    }
}

impl CalendarConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.first_hour >= self.last_hour || self.last_hour > 24 {
            return Err(Error::Config(format!(
                "calendar hours must satisfy first ({}) < last ({}) <= 24",
                self.first_hour, self.last_hour
            )));
        }
        Ok(())
    }

    /// Number of hour rows shown.
    pub fn rows(&self) -> usize {
        self.last_hour.saturating_sub(self.first_hour) as usize
    }

    /// Returns the UTC bounds `[start, end)` of the week starting on `week_start`.
    pub fn week_bounds(&self, week_start: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight(week_start);
        let end = self.local_midnight(week_start + Days::new(7));
        (start, end)
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        // Fixed offsets have exactly one mapping for every local time.
        (local - self.offset).and_utc()
    }
}

/// Returns the Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Where "now" falls in the visible grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowMarker {
    /// Day column, 0 for Monday.
    pub day: usize,
    pub hour: u32,
    pub minute: u32,
}

/// A week of records laid out in day columns and hour rows.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekView<R> {
    pub week_start: NaiveDate,
    pub config: CalendarConfig,
    cells: Vec<Vec<Vec<R>>>,
    /// Records dated outside the visible hours or outside the week.
    pub outside: Vec<R>,
    /// Records with no date.
    pub unscheduled: Vec<R>,
    /// Present only when `now` is inside the visible week and hours.
    pub now: Option<NowMarker>,
}

enum Placement {
    Cell { day: usize, row: usize, minute: u32 },
    Outside,
}

impl<R: Timestamped> WeekView<R> {
    /// Lays out `records` for the week starting on `week_start`, with `now`
    /// as the current instant.
    pub fn build<I>(week_start: NaiveDate, records: I, config: &CalendarConfig, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = R>,
    {
        let mut cells: Vec<Vec<Vec<R>>> = (0..7)
            .map(|_| (0..config.rows()).map(|_| Vec::new()).collect())
            .collect();
        let mut outside = Vec::new();
        let mut unscheduled = Vec::new();

        for record in records {
            match record.reference_time() {
                Some(at) => match place(week_start, config, at) {
                    Placement::Cell { day, row, .. } => cells[day][row].push(record),
                    Placement::Outside => outside.push(record),
                },
                None => unscheduled.push(record),
            }
        }

        for day in &mut cells {
            for cell in day {
                cell.sort_by_key(|r| r.reference_time());
            }
        }

        let now = match place(week_start, config, now) {
            Placement::Cell { day, row, minute } => Some(NowMarker {
                day,
                hour: config.first_hour + row as u32,
                minute,
            }),
            Placement::Outside => None,
        };

        Self {
            week_start,
            config: *config,
            cells,
            outside,
            unscheduled,
            now,
        }
    }
}

impl<R> WeekView<R> {
    /// Returns the dates of the seven day columns.
    pub fn days(&self) -> [NaiveDate; 7] {
        std::array::from_fn(|i| self.week_start + Days::new(i as u64))
    }

    /// Returns the visible hours, one per row.
    pub fn hours(&self) -> std::ops::Range<u32> {
        self.config.first_hour..self.config.last_hour
    }

    /// Returns the records in column `day` (0 for the first day) at `hour`.
    pub fn cell(&self, day: usize, hour: u32) -> &[R] {
        hour.checked_sub(self.config.first_hour)
            .and_then(|row| self.cells.get(day)?.get(row as usize))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns every record placed in column `day`, earliest first.
    pub fn day(&self, day: usize) -> impl Iterator<Item = &R> {
        self.cells.get(day).into_iter().flatten().flatten()
    }

    /// Returns the number of records placed in the grid.
    pub fn placed(&self) -> usize {
        self.cells.iter().flatten().map(Vec::len).sum()
    }
}

fn place(week_start: NaiveDate, config: &CalendarConfig, at: DateTime<Utc>) -> Placement {
    let local = at.with_timezone(&config.offset);
    let day = (local.date_naive() - week_start).num_days();
    let hour = local.hour();

    if !(0..7).contains(&day) || hour < config.first_hour || hour >= config.last_hour {
        return Placement::Outside;
    }
    Placement::Cell {
        day: day as usize,
        row: (hour - config.first_hour) as usize,
        minute: local.minute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Slot(&'static str, Option<DateTime<Utc>>);

    impl Timestamped for Slot {
        fn reference_time(&self) -> Option<DateTime<Utc>> {
            self.1
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn paris() -> CalendarConfig {
        CalendarConfig {
            offset: FixedOffset::east_opt(3600).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_monday_of() {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(monday_of(sunday), monday());
        assert_eq!(monday_of(monday()), monday());
    }

    #[test]
    fn test_meetings_land_in_local_hour_rows() {
        let meetings = [
            Slot("tue-9", Some(utc(5, 8, 30))),
            Slot("mon-8", Some(utc(4, 7, 0))),
            Slot("sun-19", Some(utc(10, 18, 15))),
        ];
        let view = WeekView::build(monday(), meetings, &paris(), utc(1, 0, 0));

        assert_eq!(view.cell(1, 9)[0].0, "tue-9");
        assert_eq!(view.cell(0, 8)[0].0, "mon-8");
        assert_eq!(view.cell(6, 19)[0].0, "sun-19");
        assert_eq!(view.placed(), 3);
        assert!(view.outside.is_empty());
    }

    #[test]
    fn test_outside_hours_and_week_are_reported() {
        let meetings = [
            Slot("early", Some(utc(5, 5, 0))),
            Slot("next-week", Some(utc(11, 10, 0))),
            Slot("undated", None),
        ];
        let view = WeekView::build(monday(), meetings, &CalendarConfig::default(), utc(1, 0, 0));

        assert_eq!(view.placed(), 0);
        assert_eq!(view.outside.len(), 2);
        assert_eq!(view.unscheduled, [Slot("undated", None)]);
    }

    #[test]
    fn test_now_marker() {
        let config = CalendarConfig::default();
        let inside = WeekView::<Slot>::build(monday(), [], &config, utc(6, 14, 25));
        assert_eq!(
            inside.now,
            Some(NowMarker {
                day: 2,
                hour: 14,
                minute: 25
            })
        );

        let evening = WeekView::<Slot>::build(monday(), [], &config, utc(6, 21, 0));
        assert_eq!(evening.now, None);

        let last_week = WeekView::<Slot>::build(monday(), [], &config, utc(3, 12, 0));
        assert_eq!(last_week.now, None);
    }

    #[test]
    fn test_week_bounds_follow_offset() {
        let (start, end) = paris().week_bounds(monday());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 3, 23, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_hours_are_rejected() {
        let config = CalendarConfig {
            first_hour: 20,
            last_hour: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(CalendarConfig::default().validate().is_ok());
    }
}
