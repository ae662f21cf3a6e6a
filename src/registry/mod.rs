//! Packument acquisition layer
//!
//! # Modules
//!
//! - [`transport`]: `Transport` trait and the reqwest-backed implementation
//! - [`retry`]: Retry policies and the `Resume` handle
//! - [`store`]: Deduplicating store with full-metadata fallback

pub mod retry;
pub mod store;
pub mod transport;
