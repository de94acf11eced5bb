//! # webca-cli
//!
//! Command-line front end for the webca certificate authority.
//!
//! ## Commands
//!
//! - **init**: create the root CA and signing keys, write the data snapshot
//! - **serve**: run the issuance poller and the OCSP responder
//! - **crl**: regenerate the CRL now or when due
//! - **ocsp-query**: ask the responder about serial numbers

pub mod cli;

pub use cli::run;
