//! Time-window triage
//!
//! Groups records by how far "now" is past their reference time. Payments
//! are triaged into [`PaymentWindow`]s and meetings are laid out on a
//! [`WeekView`]. Both are pure functions of the records and one reading of
//! the clock; [`Refresher`] re-runs them as time advances.

mod calendar;
mod classifier;
mod payments;
mod refresher;

pub use calendar::*;
pub use classifier::*;
pub use payments::*;
pub use refresher::*;
