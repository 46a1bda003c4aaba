//! Object location: the cache every later stage queries by identifier.

pub mod provider;

pub use provider::{ObjectLocationProvider, TableSupplier};
