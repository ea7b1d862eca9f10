//! # SAMS Rust Backend
//!
//! School administration backend: student, guardian and class records, a
//! capacity-bounded registration workflow, payments with receipts,
//! attendance and grades, and role-gated REST endpoints.
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Identifier newtypes and shared API types
//! - [`models`]: Canonical domain entities (one definition per concept)
//! - [`db`]: Repository pattern and persistence layer (in-memory or Postgres)
//! - [`services`]: Business logic, generic over the repository
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! ## Enrollment invariant
//!
//! For every class offering, confirmed registrations never exceed capacity.
//! Occupancy is derived by counting confirmed students (never stored), and
//! the Pending -> Confirmed transition is a single atomic conditional update
//! in each backend, so concurrent confirmations cannot overbook a class.

pub mod api;

pub mod db;
pub mod models;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
