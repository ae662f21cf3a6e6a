//! Version selection layer
//!
//! Turns a packument and a specifier into one concrete release.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Specifier  │────▶│  Selector   │────▶│   Policy    │
//! │ (classify)  │     │  (rank)     │     │   (gate)    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐
//! │ Range/Semver│     │   Cutoff    │
//! │ (npm rules) │     │ (publish t) │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`specifier`]: Classifies raw specifiers as version, range or tag
//! - [`selector`]: Multi-criteria ranking that picks one manifest
//! - [`policy`]: Rejects policy-restricted selections and builds error messages
//! - [`cutoff`]: Publish-time filtering for the `before` option
//! - [`packument`]: Registry document types
//! - [`range`]: npm range grammar
//! - [`semver`]: Loose version parsing and precedence
//! - [`error`]: Error types for registry and resolution failures

pub mod cutoff;
pub mod error;
pub mod packument;
pub mod policy;
pub mod range;
pub mod selector;
pub mod semver;
pub mod specifier;
