//! Armorfloor Core - Shared types library.
//!
//! This crate provides the domain types used across the Armorfloor portal:
//! - `portal` - Customer-facing site, dashboards, and the auth layer
//! - `integration-tests` - Whole-router tests against fake collaborators
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. Everything that talks to the outside world lives in `portal`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails and user ids, plus the canonical
//!   [`types::Role`] enum with its normalization rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
