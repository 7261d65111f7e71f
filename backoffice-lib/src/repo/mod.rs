//! Repositories
//!
//! [`Backoffice`] wires one cache per domain over a shared store. Reads go
//! through the caches; writes go to the store and then invalidate their
//! [`BlastRadius`].

mod backoffice;
mod claims;
mod entity;
mod images;
mod invalidation;
mod meetings;
mod payments;
mod period;
mod poller;

pub use backoffice::*;
pub use claims::*;
pub use entity::*;
pub use images::*;
pub use invalidation::*;
pub use meetings::*;
pub use payments::*;
pub use period::*;
pub use poller::*;
