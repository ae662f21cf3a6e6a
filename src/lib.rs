//! Resolve npm package specifiers against registry packuments
//!
//! # Modules
//!
//! - [`config`]: Configuration types and registry constants
//! - [`registry`]: Packument acquisition (transport, retry, deduplicating store)
//! - [`version`]: Specifier classification, manifest selection and policy gate
//! - [`resolver`]: Facade tying acquisition and selection together

pub mod config;
pub mod registry;
pub mod resolver;
pub mod version;
