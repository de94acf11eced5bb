//! Core types and rules for the webca certificate authority.
//!
//! - **Types**: key types, usage flags, revocation reasons, templates, requests
//!   and the records produced by issuance
//! - **Policy**: pure key usage / key size / subject checks
//! - **Repository**: async storage traits consumed by the service layer
//! - **Config**: parameter names for signing key references and CRL state

pub mod config;
mod error;
pub mod policy;
pub mod repository;
pub mod types;

pub use config::{KeyRef, SigningRole};
pub use error::{CoreError, Result};
pub use types::*;
