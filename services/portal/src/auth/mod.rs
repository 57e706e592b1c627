//! Portal authentication.
//!
//! # Purpose
//! Upstream ID-token validation, portal session tokens, and the per-request
//! gate that turns a session into an access-checked caller.
pub mod gate;
pub mod keys;
pub mod oidc;
pub mod session;
pub mod signin;
