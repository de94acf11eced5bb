//! webca-service: the running parts of the webca certificate authority.
//!
//! Two long-lived tasks share the record repository:
//!
//! - **Issuance**: a polling loop that signs certificates for approved
//!   requests and regenerates the CRL when it falls due
//! - **OCSP**: an HTTP responder answering certificate status queries
//!
//! # Signing keys
//!
//! Both tasks resolve their key pairs through role pointers kept in the
//! configuration store (`store_id,serial`), looked up in the certificate
//! stores registered at startup. Missing pointers are configuration errors:
//! the poller skips its cycle, the responder refuses to start.

pub mod bootstrap;
pub mod certstore;
pub mod error;
pub mod issuance;
pub mod ocsp;
pub mod repository;
pub mod settings;
pub mod signing;

// Re-exports for convenience.
pub use bootstrap::{bootstrap_ca, CaSetup};
pub use error::ServiceError;
pub use issuance::IssuanceService;
pub use ocsp::OcspResponder;
pub use settings::ServiceConfig;

/// Result type for webca-service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
