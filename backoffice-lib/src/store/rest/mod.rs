//! REST gateway client
//!
//! Speaks the hosted database's REST dialect: one resource per table under
//! `rest/v1/`, filters as query parameters, totals in `Content-Range`, and
//! the storage signing endpoint under `storage/v1/`.

mod url;

pub use self::url::filter_params;
pub use self::url::order_to_param;
pub use self::url::select_params;
pub use self::url::value_to_param;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::Method;
use reqwest::RequestBuilder;
use serde::Deserialize;

use super::Filter;
use super::RemoteStore;
use super::Rows;
use super::Select;
use super::UrlSigner;
use crate::builder::Missing;
use crate::builder::Set;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::Record;

/// Client for the hosted database's REST gateway.
///
/// Cheap to clone (uses `Arc` internally) and safe to share across tasks.
///
/// # Example
///
/// ```ignore
/// use backoffice_lib::store::RestStore;
///
/// let store = RestStore::builder()
///     .url("https://project.example.co")
///     .api_key("public-anon-key")
///     .access_token(session_token)
///     .timeout(Duration::from_secs(15))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<RestStoreInner>,
}

struct RestStoreInner {
    base_url: ::url::Url,
    api_key: String,
    access_token: Option<String>,
    http_client: Client,
    timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl RestStore {
    /// Creates a new builder for constructing a store.
    pub fn builder() -> RestStoreBuilder<Missing, Missing> {
        RestStoreBuilder::new()
    }

    /// Returns the gateway base URL.
    pub fn base_url(&self) -> &str {
        self.inner.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> Result<::url::Url, Error> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| Error::Api(ApiError::InvalidUrl(format!("{path}: {e}"))))
    }

    fn table_url(&self, table: &str, params: &[(String, String)]) -> Result<::url::Url, Error> {
        let mut url = self.endpoint(&format!("rest/v1/{}", urlencoding::encode(table)))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: ::url::Url) -> RequestBuilder {
        let bearer = self
            .inner
            .access_token
            .as_deref()
            .unwrap_or(&self.inner.api_key);
        let mut request = self
            .inner
            .http_client
            .request(method, url)
            .header("apikey", &self.inner.api_key)
            .bearer_auth(bearer);

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, Error> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Api(ApiError::from_body(status, &body)))
        }
    }

    async fn rows(&self, response: reqwest::Response) -> Result<Vec<Record>, Error> {
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Api(ApiError::parse_with_body(e.to_string(), body)))
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        match (err.is_timeout(), self.inner.timeout) {
            (true, Some(timeout)) => Error::Api(ApiError::Timeout(timeout)),
            _ => Error::Api(ApiError::from(err)),
        }
    }

    fn by_id(id: &str) -> Vec<(String, String)> {
        filter_params(&Filter::eq("id", id))
    }
}

/// Extracts the total from a `Content-Range` header such as `0-19/312` or `*/0`.
pub fn parse_content_range(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn content_range_total(response: &reqwest::Response) -> Option<usize> {
    response
        .headers()
        .get(reqwest::header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range)
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, select: &Select) -> Result<Rows, Error> {
        let url = self.table_url(&select.table, &select_params(select))?;
        debug!("GET {}", url);

        let mut request = self.request(Method::GET, url);
        if select.count {
            request = request.header("Prefer", "count=exact");
        }
        let response = self.send(request).await?;
        let total = if select.count {
            content_range_total(&response)
        } else {
            None
        };
        let records = self.rows(response).await?;
        Ok(Rows { records, total })
    }

    async fn count(&self, table: &str, filter: Option<&Filter>) -> Result<usize, Error> {
        let params = filter.map(filter_params).unwrap_or_default();
        let url = self.table_url(table, &params)?;
        debug!("HEAD {}", url);

        let request = self.request(Method::HEAD, url).header("Prefer", "count=exact");
        let response = self.send(request).await?;
        content_range_total(&response)
            .ok_or_else(|| Error::Api(ApiError::parse("missing or malformed Content-Range header")))
    }

    async fn insert(&self, table: &str, record: &Record) -> Result<Record, Error> {
        let url = self.table_url(table, &[])?;
        debug!("POST {}", url);

        let request = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(record);
        let response = self.send(request).await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api(ApiError::parse("insert returned no row")))
    }

    async fn update(&self, table: &str, id: &str, patch: &Record) -> Result<Record, Error> {
        let url = self.table_url(table, &Self::by_id(id))?;
        debug!("PATCH {}", url);

        let request = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(patch);
        let response = self.send(request).await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(table, id))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), Error> {
        let url = self.table_url(table, &Self::by_id(id))?;
        debug!("DELETE {}", url);

        let request = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation");
        let response = self.send(request).await?;
        if self.rows(response).await?.is_empty() {
            return Err(Error::not_found(table, id));
        }
        Ok(())
    }
}

#[async_trait]
impl UrlSigner for RestStore {
    async fn sign(&self, bucket: &str, path: &str, expires_in: Duration) -> Result<String, Error> {
        let object = path.trim_start_matches('/');
        let url = self.endpoint(&format!(
            "storage/v1/object/sign/{}/{}",
            urlencoding::encode(bucket),
            object
        ))?;
        debug!("POST {}", url);

        let request = self
            .request(Method::POST, url)
            .json(&serde_json::json!({ "expiresIn": expires_in.as_secs() }));
        let response = self.send(request).await?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let signed: SignedUrlResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Api(ApiError::parse_with_body(e.to_string(), body)))?;

        let relative = signed.signed_url.trim_start_matches('/');
        Ok(self.endpoint(&format!("storage/v1/{}", relative))?.to_string())
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Builder for constructing a [`RestStore`].
///
/// Uses the typestate pattern so `url` and `api_key` must be set before
/// `build` is available.
pub struct RestStoreBuilder<Url, Key> {
    url: Url,
    api_key: Key,
    access_token: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl RestStoreBuilder<Missing, Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: Missing,
            api_key: Missing,
            access_token: None,
            timeout: None,
            connect_timeout: None,
            http_client: None,
        }
    }
}

impl Default for RestStoreBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RestStoreBuilder<Missing, K> {
    /// Sets the gateway base URL.
    pub fn url(self, url: impl Into<String>) -> RestStoreBuilder<Set<String>, K> {
        RestStoreBuilder {
            url: Set(url.into()),
            api_key: self.api_key,
            access_token: self.access_token,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl<U> RestStoreBuilder<U, Missing> {
    /// Sets the project API key sent in the `apikey` header.
    pub fn api_key(self, key: impl Into<String>) -> RestStoreBuilder<U, Set<String>> {
        RestStoreBuilder {
            url: self.url,
            api_key: Set(key.into()),
            access_token: self.access_token,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl<U, K> RestStoreBuilder<U, K> {
    /// Sets the signed-in user's access token. Without one, requests are
    /// authorised with the API key alone.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout, applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl RestStoreBuilder<Set<String>, Set<String>> {
    /// Builds the [`RestStore`].
    pub fn build(self) -> Result<RestStore, Error> {
        let mut raw = self.url.0;
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = ::url::Url::parse(&raw)
            .map_err(|e| Error::Api(ApiError::InvalidUrl(format!("{raw}: {e}"))))?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build().map_err(|e| Error::Api(ApiError::from(e)))?
            }
        };

        Ok(RestStore {
            inner: Arc::new(RestStoreInner {
                base_url,
                api_key: self.api_key.0,
                access_token: self.access_token,
                http_client,
                timeout: self.timeout,
            }),
        })
    }
}
