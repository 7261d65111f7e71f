//! Cache configuration

use std::time::Duration;

use crate::error::Error;

/// Configuration for cache TTL (time-to-live) settings.
///
/// Controls how long each kind of fetched data is served from memory before
/// the next access goes back to the remote store.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use backoffice_lib::cache::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_record_ttl(Duration::from_secs(120))
///     .with_count_ttl(Duration::from_secs(900));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for single records fetched by id.
    ///
    /// Default: 5 minutes
    pub record_ttl: Duration,

    /// TTL for list pages and period-scoped queries.
    ///
    /// Default: 5 minutes
    pub list_ttl: Duration,

    /// TTL for list totals, which change less often than pages.
    ///
    /// Default: 10 minutes
    pub count_ttl: Duration,

    /// TTL for totals persisted to the durable store, if one is configured.
    ///
    /// Default: 30 minutes
    pub durable_count_ttl: Duration,

    /// TTL for signed image URLs. Must leave `signed_url_margin` before
    /// `signed_url_expiry`.
    ///
    /// Default: 50 seconds
    pub signed_url_ttl: Duration,

    /// Lifetime requested from the signing endpoint.
    ///
    /// Default: 60 seconds
    pub signed_url_expiry: Duration,

    /// Minimum remaining validity of a signed URL served from cache.
    ///
    /// Default: 10 seconds
    pub signed_url_margin: Duration,

    /// Upper bound on a single cached fetch. `None` waits forever.
    ///
    /// Default: 30 seconds
    pub fetch_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            record_ttl: Duration::from_secs(300),         // 5 minutes
            list_ttl: Duration::from_secs(300),           // 5 minutes
            count_ttl: Duration::from_secs(600),          // 10 minutes
            durable_count_ttl: Duration::from_secs(1800), // 30 minutes
            signed_url_ttl: Duration::from_secs(50),
            signed_url_expiry: Duration::from_secs(60),
            signed_url_margin: Duration::from_secs(10),
            fetch_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl CacheConfig {
    /// Creates a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record TTL.
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = ttl;
        self
    }

    /// Sets the list TTL.
    pub fn with_list_ttl(mut self, ttl: Duration) -> Self {
        self.list_ttl = ttl;
        self
    }

    /// Sets the count TTL.
    pub fn with_count_ttl(mut self, ttl: Duration) -> Self {
        self.count_ttl = ttl;
        self
    }

    /// Sets the durable count TTL.
    pub fn with_durable_count_ttl(mut self, ttl: Duration) -> Self {
        self.durable_count_ttl = ttl;
        self
    }

    /// Sets the signed URL TTL, expiry and margin together.
    pub fn with_signed_urls(mut self, ttl: Duration, expiry: Duration, margin: Duration) -> Self {
        self.signed_url_ttl = ttl;
        self.signed_url_expiry = expiry;
        self.signed_url_margin = margin;
        self
    }

    /// Sets the per-fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Creates a config with no caching (zero TTLs).
    pub fn no_cache() -> Self {
        Self {
            record_ttl: Duration::ZERO,
            list_ttl: Duration::ZERO,
            count_ttl: Duration::ZERO,
            durable_count_ttl: Duration::ZERO,
            signed_url_ttl: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Checks that a cached signed URL can never be served after it expires.
    pub fn validate(&self) -> Result<(), Error> {
        let latest_use = self.signed_url_ttl + self.signed_url_margin;
        if latest_use > self.signed_url_expiry {
            return Err(Error::Config(format!(
                "signed URL TTL {:?} plus margin {:?} exceeds URL expiry {:?}",
                self.signed_url_ttl, self.signed_url_margin, self.signed_url_expiry
            )));
        }
        Ok(())
    }
}
