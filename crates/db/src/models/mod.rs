//! Row structs matching the database tables.
//!
//! Each submodule contains a `FromRow` entity struct and the conversions
//! to and from the engine's record types.

pub mod bulk_modification;
