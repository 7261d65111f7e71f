//! Command implementations and plain-text rendering.

use std::time::Duration;

use backoffice_lib::Backoffice;
use backoffice_lib::Response;
use backoffice_lib::domain::Claim;
use backoffice_lib::domain::Customer;
use backoffice_lib::domain::Entity;
use backoffice_lib::domain::Fliiinker;
use backoffice_lib::domain::ImageAsset;
use backoffice_lib::domain::Meeting;
use backoffice_lib::domain::Payment;
use backoffice_lib::listing::ListPage;
use backoffice_lib::listing::ListQuery;
use backoffice_lib::repo::BlastRadius;
use backoffice_lib::repo::ClaimsRepo;
use backoffice_lib::repo::Invalidate;
use backoffice_lib::repo::Period;
use backoffice_lib::triage::PaymentWindow;
use backoffice_lib::triage::Refresher;
use backoffice_lib::triage::WeekView;
use chrono::NaiveDate;
use clap::ValueEnum;
use serde_json::json;

use crate::error::CliError;

/// Tables that can be listed and fetched by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Table {
    Customers,
    Fliiinkers,
    Claims,
    Images,
}

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print_json(&self, value: &serde_json::Value) -> Result<(), CliError> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn cache_note<T>(backoffice: &Backoffice, response: &Response<T>) -> String {
    if !response.is_cached() {
        return String::new();
    }
    match response.age(backoffice.clock().now()) {
        Some(age) => format!(" (cached {}s ago)", age.num_seconds()),
        None => " (cached)".to_string(),
    }
}

pub async fn triage(backoffice: &Backoffice, days_back: i64, days_ahead: i64, out: Output) -> Result<(), CliError> {
    let period = Period::around(
        backoffice.clock().now(),
        chrono::Duration::days(days_back),
        chrono::Duration::days(days_ahead),
    )?;
    let response = backoffice.payments().triage(&period).await?;
    let note = cache_note(backoffice, &response);
    let triage = response.into_inner();

    if out.json {
        let mut windows = serde_json::Map::new();
        for (window, payments) in triage.iter() {
            let rows: Vec<_> = payments.iter().map(Entity::record).collect();
            windows.insert(window.to_string(), serde_json::to_value(rows)?);
        }
        let unscheduled: Vec<_> = triage.unscheduled.iter().map(Entity::record).collect();
        return out.print_json(&json!({
            "now": triage.now,
            "windows": windows,
            "unscheduled": unscheduled,
        }));
    }

    println!("Payments ending {} .. {}{}", period.start(), period.end(), note);
    for window in PaymentWindow::ALL {
        let payments = triage.get(&window);
        println!("\n{} ({})", window.label().to_uppercase(), payments.len());
        for payment in payments {
            print_payment(payment);
        }
    }
    if !triage.unscheduled.is_empty() {
        println!("\nNO SERVICE END DATE ({})", triage.unscheduled.len());
        for payment in &triage.unscheduled {
            print_payment(payment);
        }
    }
    Ok(())
}

fn print_payment(payment: &Payment) {
    let ended = payment
        .service_end_date()
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let amount = payment
        .amount()
        .map(|a| format!("{a:.2}"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:<38} {:>10}  ended {}",
        payment.id().unwrap_or_default(),
        amount,
        ended
    );
}

pub async fn week(backoffice: &Backoffice, date: Option<NaiveDate>, out: Output) -> Result<(), CliError> {
    let response = match date {
        Some(date) => backoffice.meetings().week(date).await?,
        None => backoffice.meetings().this_week().await?,
    };
    let note = cache_note(backoffice, &response);
    let view = response.into_inner();

    if out.json {
        return out.print_json(&week_json(&view));
    }

    println!("Week of {}{}", view.week_start, note);
    for (day, date) in view.days().iter().enumerate() {
        println!("\n{}", date.format("%a %d/%m"));
        for hour in view.hours() {
            let marker = match view.now {
                Some(now) if now.day == day && now.hour == hour => format!("  -- now {:02}:{:02}", hour, now.minute),
                _ => String::new(),
            };
            for meeting in view.cell(day, hour) {
                print_meeting(meeting, &view.config.offset);
            }
            if !marker.is_empty() {
                println!("{marker}");
            }
        }
    }
    if !view.outside.is_empty() {
        println!("\nOutside visible hours ({})", view.outside.len());
        for meeting in &view.outside {
            print_meeting(meeting, &view.config.offset);
        }
    }
    Ok(())
}

fn week_json(view: &WeekView<Meeting>) -> serde_json::Value {
    let days: Vec<_> = (0..7)
        .map(|day| {
            let meetings: Vec<_> = view.day(day).map(Entity::record).collect();
            json!({ "date": view.days()[day], "meetings": meetings })
        })
        .collect();
    let outside: Vec<_> = view.outside.iter().map(Entity::record).collect();
    let unscheduled: Vec<_> = view.unscheduled.iter().map(Entity::record).collect();
    let now = view
        .now
        .map(|now| json!({ "day": now.day, "hour": now.hour, "minute": now.minute }));
    json!({ "days": days, "outside": outside, "unscheduled": unscheduled, "now": now })
}

fn print_meeting(meeting: &Meeting, offset: &chrono::FixedOffset) {
    let at = meeting
        .meeting_date()
        .map(|d| d.with_timezone(offset).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    println!("  {}  {}", at, meeting.label());
}

pub async fn list(backoffice: &Backoffice, table: Table, query: &ListQuery, out: Output) -> Result<(), CliError> {
    match table {
        Table::Customers => {
            let page = backoffice.customers().list(query).await?;
            print_page(backoffice, page, out, |c: &Customer| {
                format!("{}  {}", c.display_name(), c.email().unwrap_or("-"))
            })
        }
        Table::Fliiinkers => {
            let page = backoffice.fliiinkers().list(query).await?;
            print_page(backoffice, page, out, |f: &Fliiinker| {
                let validated = if f.is_validated() { "validated" } else { "pending" };
                format!("{}  {}", f.display_name(), validated)
            })
        }
        Table::Claims => {
            let page = backoffice.claims().list(query).await?;
            print_page(backoffice, page, out, |c: &Claim| {
                format!("{}  [{}]", c.title(), c.status().unwrap_or("open"))
            })
        }
        Table::Images => {
            let page = backoffice.images().list(query).await?;
            print_page(backoffice, page, out, |i: &ImageAsset| {
                format!("{}  [{}]", i.path().unwrap_or("-"), i.status())
            })
        }
    }
}

fn print_page<E: Entity>(
    backoffice: &Backoffice,
    response: Response<ListPage<E>>,
    out: Output,
    line: impl Fn(&E) -> String,
) -> Result<(), CliError> {
    let note = cache_note(backoffice, &response);
    let page = response.into_inner();

    if out.json {
        let rows: Vec<_> = page.data.iter().map(Entity::record).collect();
        return out.print_json(&json!({
            "data": rows,
            "total": page.total,
            "page": page.page,
            "page_size": page.page_size,
        }));
    }

    for entity in &page.data {
        println!("{:<38} {}", entity.id().unwrap_or_default(), line(entity));
    }
    println!(
        "\npage {}/{} ({} total){}",
        page.page,
        page.total_pages().max(1),
        page.total,
        note
    );
    Ok(())
}

pub async fn get(backoffice: &Backoffice, table: Table, id: &str) -> Result<(), CliError> {
    let record = match table {
        Table::Customers => backoffice.customers().get(id).await?.into_inner().record().clone(),
        Table::Fliiinkers => backoffice.fliiinkers().get(id).await?.into_inner().record().clone(),
        Table::Claims => {
            let claim = backoffice.claims().get(id).await?.into_inner();
            if let Some(conversation) = claim.conversation_id() {
                log::debug!("claim {} chats in {}", id, conversation);
            }
            claim.record().clone()
        }
        Table::Images => backoffice.images().get(id).await?.into_inner().record().clone(),
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Prints the unresolved-claims count once, or every `every` until Ctrl-C.
pub async fn unresolved(backoffice: &Backoffice, every: Option<u64>) -> Result<(), CliError> {
    let Some(secs) = every else {
        let count = backoffice.claims().unresolved_count().await?;
        println!("{}", count.into_inner());
        return Ok(());
    };
    if secs == 0 {
        return Err(CliError::Usage("--every must be at least 1 second".to_string()));
    }

    let claims = backoffice.claims().clone();
    let refresher = Refresher::spawn("unresolved claims", Duration::from_secs(secs), move || {
        let claims = claims.clone();
        async move {
            match recount(&claims).await {
                Ok(count) => println!("{} unresolved", count),
                Err(e) => log::warn!("unresolved count failed: {}", e),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    refresher.stop().await;
    Ok(())
}

/// Expires the cached unresolved count, then reads it again.
async fn recount(claims: &ClaimsRepo) -> Result<usize, backoffice_lib::Error> {
    claims.invalidate(&BlastRadius::expired(Claim::TABLE)).await?;
    Ok(claims.unresolved_count().await?.into_inner())
}

pub async fn sign(backoffice: &Backoffice, paths: &[String]) -> Result<(), CliError> {
    let urls = backoffice.image_urls()?;
    let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
    for (path, url) in paths.iter().zip(urls.signed_urls(&paths).await) {
        match url {
            Ok(url) => println!("{}  {}", path, url.into_inner()),
            Err(e) => eprintln!("{}  error: {}", path, e),
        }
    }
    Ok(())
}

pub async fn resolve(backoffice: &Backoffice, id: &str) -> Result<(), CliError> {
    let claim = backoffice.claims().resolve(id).await?;
    println!("claim {} is now {}", id, claim.status().unwrap_or("resolved"));
    Ok(())
}

pub async fn mark_paid(backoffice: &Backoffice, id: &str) -> Result<(), CliError> {
    let payment = backoffice.payments().mark_paid(id).await?;
    println!("payment {} is now {}", id, payment.status().unwrap_or("paid"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use backoffice_lib::cache::CacheConfig;
    use backoffice_lib::cache::ManualClock;
    use backoffice_lib::model::Record;
    use backoffice_lib::store::InMemoryStore;
    use backoffice_lib::triage::CalendarConfig;
    use chrono::DateTime;
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn meeting(id: &str, at: Option<DateTime<Utc>>) -> Meeting {
        let record = Record::new().set("id", id);
        Meeting::from_record(match at {
            Some(at) => record.set("meeting_date", at),
            None => record,
        })
    }

    #[test]
    fn test_week_json_carries_now_and_unscheduled() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let meetings = [
            meeting("m-1", Some(utc(5, 9, 0))),
            meeting("m-2", Some(utc(5, 22, 0))),
            meeting("m-3", None),
        ];
        let view = WeekView::build(monday, meetings, &CalendarConfig::default(), utc(6, 14, 25));

        let json = week_json(&view);

        assert_eq!(json["now"], json!({ "day": 2, "hour": 14, "minute": 25 }));
        assert_eq!(json["days"][1]["meetings"][0]["id"], "m-1");
        assert_eq!(json["outside"][0]["id"], "m-2");
        assert_eq!(json["unscheduled"][0]["id"], "m-3");
    }

    #[test]
    fn test_week_json_now_is_null_outside_the_week() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let view = WeekView::<Meeting>::build(monday, [], &CalendarConfig::default(), utc(20, 10, 0));

        assert!(week_json(&view)["now"].is_null());
    }

    #[tokio::test]
    async fn test_recount_reads_past_the_cache() {
        let store = InMemoryStore::new();
        store.seed("claims", [Record::new().set("id", "cl-1").set("status", "open")]);
        let backoffice = Backoffice::builder()
            .store(store.clone())
            .signer(store.clone())
            .clock(Arc::new(ManualClock::new(utc(4, 9, 0))))
            .cache_config(CacheConfig::default())
            .build()
            .unwrap();
        let claims = backoffice.claims();

        assert_eq!(recount(claims).await.unwrap(), 1);
        store.seed("claims", [Record::new().set("id", "cl-2")]);
        assert_eq!(recount(claims).await.unwrap(), 2);
        assert_eq!(store.stats().counts(), 2);
    }
}
