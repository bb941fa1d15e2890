//! Curio bulk modification engine.
//!
//! Pure domain logic for defining per-property transformation pipelines
//! against a saved resource filter, previewing them as diffs, applying
//! them and reverting them. Storage, the property catalog, and filter
//! execution are reached only through the traits in [`ports`].

pub mod aggregate;
pub mod bulk_modification;
pub mod codec;
pub mod diff;
pub mod engine;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod memory;
pub mod ports;
pub mod process;
pub mod property;
pub mod registry;
pub mod standard_value;
pub mod types;
