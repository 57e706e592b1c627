//! Portal-only data model.
//!
//! Users, results and scores live in the library crates; what is left here is
//! owned by the portal alone.
mod registration;

pub use registration::{NewRegistration, Registration, RegistrationError};
