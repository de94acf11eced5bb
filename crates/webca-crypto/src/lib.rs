//! X.509 building blocks for the webca certificate authority.
//!
//! - **Keys**: RSA generation, PKCS#8 import/export, signing
//! - **Requests**: PKCS#10 parse, build and template checks
//! - **Certificates**: signing under an issuer with validity containment
//! - **Extensions**: descriptor parsing and the policy-derived extension set
//! - **CRL**: signed revocation lists with CRLNumber and CRLReason
//! - **OCSP**: request/response DER codec
//!
//! # Example
//!
//! ```no_run
//! use webca_core::SubjectName;
//! use webca_crypto::{create_ca_certificate, create_crl};
//!
//! # fn main() -> webca_crypto::Result<()> {
//! let (key, root) = create_ca_certificate(
//!     &SubjectName::common_name("Example Root"),
//!     2048,
//!     None,
//!     5 * 365 * 86_400,
//!     None,
//! )?;
//! let crl = create_crl(&[], 15, &root, &key, 1)?;
//! println!("{}", crl.to_pem());
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod certs;
pub mod crl;
pub mod csr;
mod der;
mod error;
pub mod extensions;
pub mod keys;
pub mod name;
pub mod ocsp;
pub mod serial;

pub use assembler::{build_extensions, AssembledRequest, AssemblyContext};
pub use certs::{
    create_ca_certificate, create_certificate, create_self_signed, Certificate, CertificateInfo,
    Issuer, Validity,
};
pub use crl::{create_crl, Crl, RevokedEntry};
pub use csr::{
    create_certificate_request, create_self_signed_request, validate_request, CertificateRequest,
    RequestSummary,
};
pub use error::{CryptoError, Result};
pub use extensions::{json_to_extension, Extension, ExtensionValue, GeneralName};
pub use keys::{KeyPair, PublicKey};
pub use serial::Serial;
