//! REST client for the external media catalog.
//!
//! The catalog owns properties and resources. This crate wraps its HTTP
//! API and implements the engine's catalog ports on top of it.

pub mod api;
pub mod messages;
