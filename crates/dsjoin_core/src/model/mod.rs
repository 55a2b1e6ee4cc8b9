//! Record model shared by datasources and the local override storage.
//!
//! # Responsibility
//! - Define keys, schema, and value resolution for every record kind.
//!
//! # Invariants
//! - Value resolution order is override, then backing store, else unset.
//! - Every record of one storage shares one schema slot.

pub mod dataset;
pub mod dj_dataset;
pub mod key;
pub mod record;
pub mod schema;
