//! `tenantgate-core`: identifiers and the domain error shared by every crate.
//!
//! This crate has no IO and no async.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{IdentityId, OrganizationId, SessionId};
