//! Data model types

mod record;
mod value;

pub use record::*;
pub use value::*;

pub(crate) use record::parse_timestamp;
