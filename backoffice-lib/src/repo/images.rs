//! Signed image URLs

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::cache::CacheConfig;
use crate::cache::CacheKey;
use crate::cache::KeyedCache;
use crate::error::Error;
use crate::response::Response;
use crate::store::UrlSigner;

/// Signs storage paths into time-limited URLs and caches them for less than
/// their validity.
///
/// A cached URL is served for at most `signed_url_ttl`, and construction
/// fails unless `signed_url_ttl + signed_url_margin <= signed_url_expiry`, so
/// every URL handed out stays valid for at least the margin.
#[derive(Clone)]
pub struct ImageUrls {
    signer: Arc<dyn UrlSigner>,
    urls: KeyedCache<String>,
    bucket: String,
    ttl: Duration,
    expiry: Duration,
}

impl ImageUrls {
    pub fn new(
        signer: Arc<dyn UrlSigner>,
        urls: KeyedCache<String>,
        bucket: impl Into<String>,
        config: &CacheConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            signer,
            urls,
            bucket: bucket.into(),
            ttl: config.signed_url_ttl,
            expiry: config.signed_url_expiry,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns a URL for `path` that is valid for at least the configured margin.
    pub async fn signed_url(&self, path: &str) -> Result<Response<String>, Error> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(Error::InvalidKey("empty image path".to_string()));
        }

        let key = CacheKey::compose([self.bucket.as_str(), path]);
        let signer = Arc::clone(&self.signer);
        let bucket = self.bucket.clone();
        let object = path.to_string();
        let expiry = self.expiry;

        self.urls
            .get_or_fetch(&key, self.ttl, move || async move {
                signer.sign(&bucket, &object, expiry).await
            })
            .await
    }

    /// Signs several paths concurrently. Results keep the order of `paths`.
    pub async fn signed_urls(&self, paths: &[&str]) -> Vec<Result<Response<String>, Error>> {
        join_all(paths.iter().map(|path| self.signed_url(path))).await
    }

    /// Drops the cached URL for `path`.
    pub fn invalidate(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.urls
            .invalidate(CacheKey::compose([self.bucket.as_str(), path]))
    }

    pub fn invalidate_all(&self) {
        self.urls.invalidate_all();
    }
}
