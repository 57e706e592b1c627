//! Portal HTTP API module.
//!
//! # Purpose
//! Route handlers grouped by area, the shared error type, and the OpenAPI
//! document.
pub mod admin;
pub mod bootstrap;
pub mod error;
pub mod games;
pub mod openapi;
pub mod registrations;
pub mod results;
pub mod system;
pub mod types;
