//! PrepDesk student portal service library crate.
//!
//! # Purpose
//! Exposes the portal's HTTP API, auth helpers, configuration, datasets,
//! roster tooling, and storage backends for use by the binary and tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod datasets;
pub mod model;
pub mod observability;
pub mod roster;
pub mod store;
