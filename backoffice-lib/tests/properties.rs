//! End-to-end cache and triage behavior against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use backoffice_lib::Backoffice;
use backoffice_lib::Error;
use backoffice_lib::cache::CacheConfig;
use backoffice_lib::cache::Clock;
use backoffice_lib::cache::KeyedCache;
use backoffice_lib::cache::ManualClock;
use backoffice_lib::domain::Entity;
use backoffice_lib::error::ApiError;
use backoffice_lib::listing::ListQuery;
use backoffice_lib::model::Record;
use backoffice_lib::repo::BlastRadius;
use backoffice_lib::repo::Invalidate;
use backoffice_lib::repo::Period;
use backoffice_lib::store::InMemoryStore;
use backoffice_lib::triage::PaymentWindow;
use backoffice_lib::triage::PaymentWindows;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::join_all;

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap())
}

fn cache(clock: &ManualClock) -> KeyedCache<String> {
    KeyedCache::with_parts("test".to_string(), Arc::new(clock.clone()), None)
}

fn backoffice(store: &InMemoryStore, clock: &ManualClock) -> Backoffice {
    Backoffice::builder()
        .store(store.clone())
        .signer(store.clone())
        .clock(Arc::new(clock.clone()))
        .cache_config(CacheConfig::default())
        .build()
        .unwrap()
}

/// Fetch closure that counts its invocations and resolves to `value`.
fn counting(
    calls: &Arc<AtomicUsize>,
    value: Result<&str, Error>,
    delay: Duration,
) -> impl FnOnce() -> BoxFuture<'static, Result<String, Error>> {
    let calls = Arc::clone(calls);
    let value = value.map(str::to_string);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            value
        }
        .boxed()
    }
}

fn unavailable() -> Error {
    Error::Api(ApiError::http(503, "upstream unavailable"))
}

#[tokio::test]
async fn test_fresh_hit_does_not_fetch() {
    let clock = clock();
    let cache = cache(&clock);
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    let first = cache.get_or_fetch("k", ttl, counting(&calls, Ok("v1"), Duration::ZERO)).await.unwrap();
    clock.advance(chrono::Duration::seconds(59));
    let second = cache.get_or_fetch("k", ttl, counting(&calls, Ok("v2"), Duration::ZERO)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!first.is_cached());
    assert!(second.is_cached());
    assert_eq!(second.data(), "v1");
    assert_eq!(second.cached_at(), first.cached_at());
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let clock = clock();
    let cache = cache(&clock);
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    cache.get_or_fetch("k", ttl, counting(&calls, Ok("v1"), Duration::ZERO)).await.unwrap();
    clock.advance(chrono::Duration::milliseconds(60_001));
    let refreshed = cache.get_or_fetch("k", ttl, counting(&calls, Ok("v2"), Duration::ZERO)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(refreshed.data(), "v2");
    assert_eq!(refreshed.cached_at(), Some(clock.now()));
    assert_eq!(cache.peek("k"), Some(("v2".to_string(), clock.now())));
}

#[tokio::test]
async fn test_concurrent_misses_share_one_fetch() {
    let cache = KeyedCache::<String>::new("shared");
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    let results = join_all(
        (0..10).map(|_| cache.get_or_fetch("k", ttl, counting(&calls, Ok("v"), Duration::from_millis(20)))),
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| r.as_ref().unwrap().data() == "v"));
    assert_eq!(results.iter().filter(|r| r.as_ref().unwrap().cache.is_miss()).count(), 1);
}

#[tokio::test]
async fn test_concurrent_misses_share_one_failure() {
    let cache = KeyedCache::<String>::new("shared");
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    let results = join_all(
        (0..10).map(|_| cache.get_or_fetch("k", ttl, counting(&calls, Err(unavailable()), Duration::from_millis(20)))),
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Api(ref api) if api.status_code() == Some(503)));
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let clock = clock();
    let cache = cache(&clock);
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_secs(60);

    let failed = cache.get_or_fetch("k", ttl, counting(&calls, Err(unavailable()), Duration::ZERO)).await;
    assert!(failed.is_err());

    let recovered = cache.get_or_fetch("k", ttl, counting(&calls, Ok("v"), Duration::ZERO)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(recovered.data(), "v");
}

#[tokio::test]
async fn test_store_failure_then_success_through_repo() {
    let store = InMemoryStore::new();
    store.seed("customers", [Record::new().set("id", "c-1").set("first_name", "Jean")]);
    let backoffice = backoffice(&store, &clock());

    store.fail_next(unavailable());
    assert!(backoffice.customers().get("c-1").await.is_err());

    let customer = backoffice.customers().get("c-1").await.unwrap();
    assert_eq!(customer.data().display_name(), "Jean");
    assert_eq!(store.stats().selects(), 2);
}

#[test]
fn test_classification_boundary() {
    let classifier = PaymentWindows::default().classifier();
    let end = at("2024-01-01T00:00:00Z");

    assert_eq!(classifier.bucket_for(end, at("2024-01-01T23:59:59Z")), &PaymentWindow::DueTomorrow);
    assert_eq!(classifier.bucket_for(end, at("2024-01-02T00:00:00Z")), &PaymentWindow::DueToday);
    assert_eq!(classifier.bucket_for(end, at("2024-01-02T01:00:00Z")), &PaymentWindow::DueToday);
    assert_eq!(classifier.bucket_for(end, at("2024-01-03T00:00:00Z")), &PaymentWindow::Overdue);
}

#[tokio::test]
async fn test_payment_triage_is_deterministic() {
    let store = InMemoryStore::new();
    store.seed(
        "payments",
        [
            Record::new().set("id", "p-1").set("status", "pending").set("service_end_date", "2024-01-01T00:00:00Z"),
            Record::new().set("id", "p-2").set("status", "pending").set("service_end_date", "2023-12-30T00:00:00Z"),
            Record::new().set("id", "p-3").set("status", "pending").set("service_end_date", "2024-01-01T12:00:00Z"),
            Record::new().set("id", "p-4").set("status", "paid").set("service_end_date", "2024-01-01T00:00:00Z"),
            Record::new().set("id", "p-5").set("status", "pending").set("service_end_date", "2023-11-20T00:00:00Z"),
            Record::new().set("id", "p-6").set("status", "pending"),
        ],
    );
    let clock = clock();
    let backoffice = backoffice(&store, &clock);
    let period = Period::around(clock.now(), chrono::Duration::days(7), chrono::Duration::days(7)).unwrap();

    let first = backoffice.payments().triage(&period).await.unwrap().into_inner();
    let second = backoffice.payments().triage(&period).await.unwrap().into_inner();

    let ids = |window| {
        first
            .get(&window)
            .iter()
            .filter_map(Entity::id)
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(PaymentWindow::DueToday), vec!["p-1"]);
    assert_eq!(ids(PaymentWindow::Overdue), vec!["p-5", "p-2"]);
    assert_eq!(ids(PaymentWindow::DueTomorrow), vec!["p-3"]);
    let unscheduled: Vec<_> = first.unscheduled.iter().filter_map(Entity::id).collect();
    assert_eq!(unscheduled, vec!["p-6"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_search_requires_every_word() {
    let store = InMemoryStore::new();
    store.seed(
        "customers",
        [
            Record::new().set("id", "c-1").set("first_name", "Jean").set("last_name", "Dupont"),
            Record::new().set("id", "c-2").set("first_name", "Jean").set("last_name", "Martin"),
            Record::new().set("id", "c-3").set("first_name", "Marie").set("last_name", "Dupont"),
        ],
    );
    let backoffice = backoffice(&store, &clock());

    let page = backoffice
        .customers()
        .list(&ListQuery::default().with_search("jean dupont"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(page.total, 1);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].display_name(), "Jean Dupont");
}

#[tokio::test]
async fn test_write_invalidates_cached_reads() {
    let store = InMemoryStore::new();
    store.seed("customers", [Record::new().set("id", "c-1").set("first_name", "Jean")]);
    let backoffice = backoffice(&store, &clock());
    let customers = backoffice.customers();

    let query = ListQuery::default();
    assert_eq!(customers.get("c-1").await.unwrap().data().display_name(), "Jean");
    customers.list(&query).await.unwrap();
    let selects = store.stats().selects();

    customers.update("c-1", &Record::new().set("first_name", "Jeanne")).await.unwrap();

    let fresh = customers.get("c-1").await.unwrap();
    assert!(!fresh.is_cached());
    assert_eq!(fresh.data().display_name(), "Jeanne");
    let page = customers.list(&query).await.unwrap();
    assert!(!page.is_cached());
    assert_eq!(page.data().data[0].display_name(), "Jeanne");
    assert!(store.stats().selects() > selects);
}

#[tokio::test]
async fn test_unresolved_count_follows_changes() {
    let store = InMemoryStore::new();
    store.seed(
        "claims",
        [
            Record::new().set("id", "cl-1").set("status", "open"),
            Record::new().set("id", "cl-2"),
            Record::new().set("id", "cl-3").set("status", "closed"),
        ],
    );
    let backoffice = backoffice(&store, &clock());
    let unresolved = backoffice.claims().watch_unresolved(&store);

    let wait = |rx: &tokio::sync::watch::Receiver<Option<usize>>, expected: usize| {
        let mut rx = rx.clone();
        async move {
            tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|count| *count == Some(expected)))
                .await
                .expect("count not published")
                .map(|_| ())
        }
    };

    wait(&unresolved, 2).await.unwrap();
    backoffice.claims().resolve("cl-1").await.unwrap();
    wait(&unresolved, 1).await.unwrap();
}

#[tokio::test]
async fn test_polling_tick_joins_the_fetch_in_flight() {
    let store = InMemoryStore::new();
    store.seed(
        "claims",
        [
            Record::new().set("id", "cl-1").set("status", "open"),
            Record::new().set("id", "cl-2"),
        ],
    );
    store.set_latency(Some(Duration::from_millis(100)));
    let backoffice = backoffice(&store, &clock());

    let claims = backoffice.claims().clone();
    let slow = tokio::spawn(async move { claims.unresolved_count().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    backoffice.invalidate(&BlastRadius::expired("claims")).await.unwrap();
    let second = backoffice.claims().unresolved_count().await.unwrap();
    let first = slow.await.unwrap().unwrap();

    assert_eq!(*first.data(), 2);
    assert_eq!(*second.data(), 2);
    assert_eq!(store.stats().counts(), 1);
}

#[tokio::test]
async fn test_write_during_fetch_forces_a_new_fetch() {
    let store = InMemoryStore::new();
    store.seed("claims", [Record::new().set("id", "cl-1").set("status", "open")]);
    store.set_latency(Some(Duration::from_millis(100)));
    let backoffice = backoffice(&store, &clock());

    let claims = backoffice.claims().clone();
    let slow = tokio::spawn(async move { claims.unresolved_count().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    backoffice.invalidate(&BlastRadius::table("claims")).await.unwrap();
    backoffice.claims().unresolved_count().await.unwrap();
    slow.await.unwrap().unwrap();

    assert_eq!(store.stats().counts(), 2);
}

#[tokio::test]
async fn test_conversation_id_falls_back_to_claim_id() {
    let store = InMemoryStore::new();
    store.seed(
        "claims",
        [
            Record::new().set("id", "cl-1"),
            Record::new().set("id", "cl-2").set("channel_id", "support-42"),
        ],
    );
    let backoffice = backoffice(&store, &clock());

    let plain = backoffice.claims().get("cl-1").await.unwrap().into_inner();
    let linked = backoffice.claims().get("cl-2").await.unwrap().into_inner();
    assert_eq!(plain.conversation_id().as_deref(), Some("claim-cl-1"));
    assert_eq!(linked.conversation_id().as_deref(), Some("support-42"));
}

#[tokio::test]
async fn test_signed_urls_are_cached_per_path() {
    let store = InMemoryStore::new();
    let backoffice = backoffice(&store, &clock());
    let urls = backoffice.image_urls().unwrap();

    let first = urls.signed_url("avatars/a.png").await.unwrap();
    let again = urls.signed_url("/avatars/a.png").await.unwrap();
    assert!(first.data().starts_with("memory://images/avatars/a.png"));
    assert_eq!(first.data(), again.data());
    assert_eq!(store.stats().signs(), 1);
}
