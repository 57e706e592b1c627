//! PrepDesk identity primitives shared by the portal service and its batch tools.
//!
//! # Purpose
//! Centralizes the student/admin identity model, the access gate, and the
//! reconciliation logic that maps a user's scattered identifiers (6-digit IBA
//! role numbers, 7-digit FBS role numbers, legacy directory ids, emails) onto a
//! row in a result book.
//!
//! # How it fits
//! The portal resolves every request through [`resolve_access`], looks up test
//! results with [`find_student_result`], and runs roster imports and
//! role-number backfills through the planning helpers in [`roster`]. Nothing
//! in this crate performs I/O; callers load files and talk to the store.
//!
//! # Key invariants
//! - Role numbers are 6 or 7 ASCII digits; [`RoleNumber`] cannot hold anything else.
//! - Emails are compared case-insensitively and stored lower-cased.
//! - Unknown or inactive users resolve to [`AccessProfile::denied`], never an error.
//!
//! # Examples
//! ```rust
//! use prepdesk_identity::{RoleNumber, Track};
//!
//! let iba = RoleNumber::parse("123456").expect("six digits");
//! assert_eq!(iba.track(), Track::Iba);
//! assert!(RoleNumber::parse("12345").is_err());
//! ```

mod access;
mod directory;
mod email;
mod errors;
mod reconcile;
mod results;
pub mod roster;
mod role_number;
mod user;

pub use access::{AccessProfile, resolve_access};
pub use directory::{DirectoryEntry, StudentsDirectory};
pub use email::{is_plausible_email, normalize_email};
pub use errors::{IdentityError, IdentityResult};
pub use reconcile::{MatchStrategy, ResultLookup, ResultQuery, find_student_result};
pub use results::{ResultBook, ResultKind, SectionScore, TestResult, TestSheet};
pub use role_number::{RoleNumber, Track};
pub use user::{AccessTypes, MockAccess, MockVariant, Role, User, UserInfo};
