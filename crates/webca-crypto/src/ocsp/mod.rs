//! OCSP message codec (RFC 6960).
//!
//! Requests are parsed and built with SHA-1 CertIDs; responses are built as
//! `id-pkix-ocsp-basic` and signed with the responder key. A parser for
//! responses is provided for clients and tests.

mod request;
mod response;

pub use request::{CertId, OcspRequest};
pub use response::{
    build_response, error_response, BasicResponse, CertStatus, OcspResponse, OcspResponseStatus,
    ResponseSigner, SingleResponse,
};

/// id-pkix-ocsp-nonce
pub const OID_OCSP_NONCE: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 2];
/// id-pkix-ocsp-basic
pub const OID_OCSP_BASIC: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1, 1];

/// Content type of a DER request body
pub const REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";
/// Content type of a DER response body
pub const RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";
