//! The shared back-office context

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use super::BlastRadius;
use super::ChangeFollower;
use super::ClaimsRepo;
use super::EntityRepo;
use super::ImageUrls;
use super::Invalidate;
use super::MeetingsRepo;
use super::PaymentsRepo;
use super::Poller;
use crate::builder::Missing;
use crate::builder::Set;
use crate::cache::CacheConfig;
use crate::cache::Clock;
use crate::cache::DurableStore;
use crate::cache::KeyedCache;
use crate::cache::SystemClock;
use crate::domain::Claim;
use crate::domain::Customer;
use crate::domain::Entity;
use crate::domain::Fliiinker;
use crate::domain::ImageAsset;
use crate::domain::Meeting;
use crate::domain::Payment;
use crate::error::Error;
use crate::listing::Lister;
use crate::store::ChangeSource;
use crate::store::RemoteStore;
use crate::store::UrlSigner;
use crate::triage::CalendarConfig;
use crate::triage::PaymentWindows;

/// Default storage bucket for verification photos.
pub const DEFAULT_IMAGE_BUCKET: &str = "images";

/// Every repository of the back office, built over one store with one
/// cache per domain.
///
/// Cheap to clone (uses `Arc` internally). Caches live as long as the
/// context; [`reset`](Self::reset) empties all of them, e.g. when the
/// signed-in operator changes.
///
/// # Example
///
/// ```ignore
/// use backoffice_lib::Backoffice;
/// use backoffice_lib::store::RestStore;
///
/// let store = RestStore::builder().url(url).api_key(key).build()?;
/// let backoffice = Backoffice::builder()
///     .store(store.clone())
///     .signer(store)
///     .build()?;
///
/// let claim = backoffice.claims().get("42").await?;
/// ```
#[derive(Clone)]
pub struct Backoffice {
    inner: Arc<BackofficeInner>,
}

struct BackofficeInner {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    customers: EntityRepo<Customer>,
    fliiinkers: EntityRepo<Fliiinker>,
    claims: ClaimsRepo,
    images: EntityRepo<ImageAsset>,
    image_urls: Option<ImageUrls>,
    payments: PaymentsRepo,
    meetings: MeetingsRepo,
}

impl Backoffice {
    pub fn builder() -> BackofficeBuilder<Missing> {
        BackofficeBuilder::new()
    }

    pub fn customers(&self) -> &EntityRepo<Customer> {
        &self.inner.customers
    }

    pub fn fliiinkers(&self) -> &EntityRepo<Fliiinker> {
        &self.inner.fliiinkers
    }

    pub fn claims(&self) -> &ClaimsRepo {
        &self.inner.claims
    }

    /// The photo verification queue.
    pub fn images(&self) -> &EntityRepo<ImageAsset> {
        &self.inner.images
    }

    /// Signed URLs for stored images. Fails if no signer was configured.
    pub fn image_urls(&self) -> Result<&ImageUrls, Error> {
        self.inner
            .image_urls
            .as_ref()
            .ok_or_else(|| Error::Config("no URL signer configured".to_string()))
    }

    pub fn payments(&self) -> &PaymentsRepo {
        &self.inner.payments
    }

    pub fn meetings(&self) -> &MeetingsRepo {
        &self.inner.meetings
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Empties every cache, durable totals included.
    pub async fn reset(&self) -> Result<(), Error> {
        self.inner.customers.invalidate_all().await?;
        self.inner.fliiinkers.invalidate_all().await?;
        self.inner.claims.invalidate_all().await?;
        self.inner.images.invalidate_all().await?;
        if let Some(urls) = &self.inner.image_urls {
            urls.invalidate_all();
        }
        for table in [Payment::TABLE, Meeting::TABLE] {
            self.invalidate(&BlastRadius::table(table)).await?;
        }
        info!("back office caches reset");
        Ok(())
    }

    /// Drops the cached views of `tables` every `period`.
    pub fn poll(&self, tables: &[&str], period: Duration) -> Poller {
        Poller::spawn(Arc::new(self.clone()), tables, period)
    }

    /// Drops cache entries as realtime changes of `table` arrive.
    pub fn follow(&self, source: &dyn ChangeSource, table: &str) -> ChangeFollower {
        ChangeFollower::spawn(source, table, Arc::new(self.clone()))
    }
}

#[async_trait]
impl Invalidate for Backoffice {
    async fn invalidate(&self, radius: &BlastRadius) -> Result<(), Error> {
        let inner = &self.inner;
        inner.customers.invalidate(radius).await?;
        inner.fliiinkers.invalidate(radius).await?;
        inner.claims.invalidate(radius).await?;
        inner.images.invalidate(radius).await?;
        inner.payments.invalidate(radius).await?;
        inner.meetings.invalidate(radius).await
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Builder for constructing a [`Backoffice`].
///
/// A remote store must be set before `build` is available.
pub struct BackofficeBuilder<S> {
    store: S,
    signer: Option<Arc<dyn UrlSigner>>,
    durable: Option<Arc<dyn DurableStore>>,
    clock: Option<Arc<dyn Clock>>,
    config: CacheConfig,
    windows: PaymentWindows,
    calendar: CalendarConfig,
    image_bucket: String,
}

impl BackofficeBuilder<Missing> {
    pub fn new() -> Self {
        Self {
            store: Missing,
            signer: None,
            durable: None,
            clock: None,
            config: CacheConfig::default(),
            windows: PaymentWindows::default(),
            calendar: CalendarConfig::default(),
            image_bucket: DEFAULT_IMAGE_BUCKET.to_string(),
        }
    }

    /// Sets the remote store every repository reads from.
    pub fn store(self, store: impl RemoteStore + 'static) -> BackofficeBuilder<Set<Arc<dyn RemoteStore>>> {
        self.shared_store(Arc::new(store))
    }

    /// Sets an already shared remote store.
    pub fn shared_store(self, store: Arc<dyn RemoteStore>) -> BackofficeBuilder<Set<Arc<dyn RemoteStore>>> {
        BackofficeBuilder {
            store: Set(store),
            signer: self.signer,
            durable: self.durable,
            clock: self.clock,
            config: self.config,
            windows: self.windows,
            calendar: self.calendar,
            image_bucket: self.image_bucket,
        }
    }
}

impl Default for BackofficeBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> BackofficeBuilder<S> {
    /// Sets the signer for image URLs.
    pub fn signer(mut self, signer: impl UrlSigner + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Persists list totals to `durable`.
    pub fn durable(mut self, durable: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Sets the clock for TTLs and classification. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn payment_windows(mut self, windows: PaymentWindows) -> Self {
        self.windows = windows;
        self
    }

    pub fn calendar(mut self, calendar: CalendarConfig) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn image_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.image_bucket = bucket.into();
        self
    }
}

impl BackofficeBuilder<Set<Arc<dyn RemoteStore>>> {
    /// Validates the configuration and builds the context.
    pub fn build(self) -> Result<Backoffice, Error> {
        self.config.validate()?;
        self.windows.validate()?;
        self.calendar.validate()?;

        let store = self.store.0;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = self.config;
        let timeout = config.fetch_timeout;

        let lister = |table: &str| {
            let lister = Lister::new(
                Arc::clone(&store),
                keyed(&format!("{table} pages"), &clock, timeout),
                keyed(&format!("{table} counts"), &clock, timeout),
                config.clone(),
            );
            match &self.durable {
                Some(durable) => lister.with_durable(Arc::clone(durable)),
                None => lister,
            }
        };

        let customers = EntityRepo::new(
            Arc::clone(&store),
            keyed(Customer::TABLE, &clock, timeout),
            lister(Customer::TABLE),
            config.record_ttl,
        );
        let fliiinkers = EntityRepo::new(
            Arc::clone(&store),
            keyed(Fliiinker::TABLE, &clock, timeout),
            lister(Fliiinker::TABLE),
            config.record_ttl,
        );
        let claims = ClaimsRepo::new(
            EntityRepo::new(
                Arc::clone(&store),
                keyed(Claim::TABLE, &clock, timeout),
                lister(Claim::TABLE),
                config.record_ttl,
            ),
            Arc::clone(&store),
            keyed("unresolved claims", &clock, timeout),
            config.count_ttl,
        );
        let images = EntityRepo::new(
            Arc::clone(&store),
            keyed(ImageAsset::TABLE, &clock, timeout),
            lister(ImageAsset::TABLE),
            config.record_ttl,
        );
        let image_urls = match self.signer {
            Some(signer) => Some(ImageUrls::new(
                signer,
                keyed("signed urls", &clock, timeout),
                self.image_bucket,
                &config,
            )?),
            None => None,
        };
        let payments = PaymentsRepo::new(
            Arc::clone(&store),
            keyed("payment periods", &clock, timeout),
            config.list_ttl,
            self.windows,
            Arc::clone(&clock),
        );
        let meetings = MeetingsRepo::new(
            Arc::clone(&store),
            keyed("meeting weeks", &clock, timeout),
            config.list_ttl,
            self.calendar,
            Arc::clone(&clock),
        );

        Ok(Backoffice {
            inner: Arc::new(BackofficeInner {
                store,
                clock,
                config,
                customers,
                fliiinkers,
                claims,
                images,
                image_urls,
                payments,
                meetings,
            }),
        })
    }
}

fn keyed<V>(name: &str, clock: &Arc<dyn Clock>, timeout: Option<Duration>) -> KeyedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    KeyedCache::with_parts(name.to_string(), Arc::clone(clock), timeout)
}
