//! Database schemas for Townhall
//!
//! Defines MongoDB document structures for users and issues.

mod issue;
mod metadata;
mod user;

pub use issue::{Category, GeoPoint, IssueDoc, Priority, Status, ISSUE_COLLECTION};
pub use metadata::Metadata;
pub use user::{UserDoc, USER_COLLECTION};
