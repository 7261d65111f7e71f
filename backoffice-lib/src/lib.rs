//! Back-office data layer
//!
//! An async data layer for a services marketplace back office backed by a
//! hosted database REST gateway. It provides:
//!
//! - a read-through keyed TTL cache with in-flight de-duplication ([`cache`]),
//! - time-window classification for payment triage and a weekly meeting
//!   calendar ([`triage`]),
//! - paginated, searchable list fetches with separately cached totals
//!   ([`listing`]),
//! - typed domain views and repositories over one shared context ([`repo`]).

pub mod builder;
pub mod cache;
pub mod domain;
pub mod error;
pub mod listing;
pub mod model;
pub mod repo;
pub mod response;
pub mod store;
pub mod triage;

pub use error::Error;
pub use repo::Backoffice;
pub use response::CacheStatus;
pub use response::Freshness;
pub use response::Response;
