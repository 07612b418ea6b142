//! Armorfloor Portal library.
//!
//! The portal serves three audiences off one binary: the public marketing
//! site, the lead/quote intake funnel, and the role-gated dashboards for the
//! back office, the sales crew, and customers.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - A hosted identity service owns passwords and sessions; the portal holds
//!   only the token-pair cookies
//! - `PostgreSQL` holds the user directory (email -> role) and business data
//! - Every request passes the route guard in [`middleware::guard`], which
//!   asks [`session::SessionManager`] for a fresh session snapshot
//!
//! The session layer is built for bad days: provider failures degrade to a
//! well-formed anonymous state, client sessions recover through retry with
//! exponential backoff, and the public site stays up when auth is down.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
