//! OCSP responder: certificate status from the revocation and certificate
//! records, signed with the OCSP signing key.
//!
//! Signing material is loaded once by [`OcspResponder::from_config`] and never
//! reloaded; build a new responder to pick up a new key.

mod http;

pub use http::{router, serve};

use std::sync::Arc;

use tracing::{debug, error, warn};
use webca_core::repository::CaRepository;
use webca_core::SigningRole;
use webca_crypto::ocsp::{
    build_response, error_response, CertStatus, OcspRequest, OcspResponseStatus,
    ResponseSigner,
};
use webca_crypto::{Certificate, Serial};

use crate::certstore::StoreRegistry;
use crate::signing::{load_signing_pair, SigningPair};
use crate::Result;

/// Answers OCSP requests for certificates issued by the CA
pub struct OcspResponder {
    repo: Arc<dyn CaRepository>,
    issuer: Certificate,
    signer: SigningPair,
}

impl std::fmt::Debug for OcspResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcspResponder")
            .field("issuer", &self.issuer.serial())
            .field("signer", &self.signer.certificate.serial())
            .finish_non_exhaustive()
    }
}

impl OcspResponder {
    /// Load the issuer certificate and the OCSP signing pair.
    ///
    /// Fails when either role is not configured or does not resolve.
    pub async fn from_config(repo: Arc<dyn CaRepository>, stores: &StoreRegistry) -> Result<Self> {
        let issuer = load_signing_pair(&*repo, stores, SigningRole::CertSign)
            .await?
            .certificate;
        let signer = load_signing_pair(&*repo, stores, SigningRole::OcspSign).await?;
        Ok(Self {
            repo,
            issuer,
            signer,
        })
    }

    #[must_use]
    pub const fn issuer(&self) -> &Certificate {
        &self.issuer
    }

    /// Answer a DER encoded OCSP request.
    ///
    /// Always returns a DER `OCSPResponse`: `malformed_request` when the
    /// request cannot be parsed, `internal_error` when any serial is unknown
    /// or signing fails.
    pub async fn handle(&self, request: &[u8]) -> Vec<u8> {
        let request = match OcspRequest::parse(request) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed OCSP request");
                return error_response(OcspResponseStatus::MalformedRequest);
            }
        };
        match self.respond(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "OCSP response failed");
                error_response(OcspResponseStatus::InternalError)
            }
        }
    }

    async fn respond(&self, request: &OcspRequest) -> Result<Vec<u8>> {
        let mut statuses = Vec::with_capacity(request.cert_ids.len());
        for id in &request.cert_ids {
            let Some(status) = self.status_of(&id.serial).await? else {
                // No record means no way to answer "unknown" with the right CertID
                warn!(serial = %id.serial, "OCSP query for unknown serial");
                return Ok(error_response(OcspResponseStatus::InternalError));
            };
            debug!(serial = %id.serial, status = ?status, "OCSP status");
            statuses.push((id.clone(), status));
        }

        let signer = ResponseSigner {
            key: &self.signer.key,
            certificate: &self.signer.certificate,
            issuer: &self.issuer,
        };
        Ok(build_response(&signer, &statuses, request.nonce.as_ref())?)
    }

    /// Revocation first, then issuance; `None` when neither is recorded
    async fn status_of(&self, serial: &Serial) -> Result<Option<CertStatus>> {
        let hex = serial.to_hex();
        if let Some(revoked) = self.repo.revoked_by_serial(&hex).await? {
            return Ok(Some(CertStatus::Revoked {
                date: revoked.date,
                reason: Some(revoked.reason),
            }));
        }
        if self.repo.certificate_by_serial(&hex).await?.is_some() {
            return Ok(Some(CertStatus::Good));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{bootstrap_ca, Bootstrapped, CaSetup};
    use crate::certstore::MemoryStore;
    use crate::repository::MemoryRepository;
    use chrono::Utc;
    use webca_core::repository::{CertificateRepository, RevokedRepository};
    use webca_core::{CertificateRecord, RevocationReason, Revoked};
    use webca_crypto::ocsp::{CertId, OcspResponse};
    use webca_crypto::Extension;

    struct Fixture {
        responder: OcspResponder,
        repo: Arc<MemoryRepository>,
        ca: Bootstrapped,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(MemoryStore::new());
        let ca = bootstrap_ca(&*repo, &*store, &CaSetup::default())
            .await
            .unwrap();
        let stores = StoreRegistry::new().with_store(store);
        let responder = OcspResponder::from_config(repo.clone(), &stores)
            .await
            .unwrap();
        Fixture {
            responder,
            repo,
            ca,
        }
    }

    async fn issued(repo: &MemoryRepository, serial: &Serial) {
        repo.insert_certificate(CertificateRecord {
            serial: serial.to_hex(),
            request_id: None,
            user: String::from("alice"),
            subject: String::from("/CN=alice"),
            valid_from: Utc::now(),
            valid_to: Utc::now(),
            issuer_serial: String::from("01"),
            pem: String::new(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_from_config_requires_keys() {
        let repo: Arc<dyn CaRepository> = Arc::new(MemoryRepository::new());
        let stores = StoreRegistry::new().with_store(Arc::new(MemoryStore::new()));
        assert!(OcspResponder::from_config(repo, &stores).await.is_err());
    }

    #[tokio::test]
    async fn test_good_and_revoked() {
        let f = fixture().await;
        let good = Serial::generate();
        let revoked = Serial::generate();
        issued(&f.repo, &good).await;
        issued(&f.repo, &revoked).await;
        f.repo
            .insert_revoked(Revoked::new(revoked.to_hex(), RevocationReason::KeyCompromise))
            .await
            .unwrap();

        let request = OcspRequest::new(vec![
            CertId::new(&f.ca.root, &good),
            CertId::new(&f.ca.root, &revoked),
        ])
        .with_nonce(b"0123456789");
        let der = f.responder.handle(&request.to_der()).await;

        let response = OcspResponse::parse(&der).unwrap();
        assert_eq!(response.status, OcspResponseStatus::Successful);
        let basic = response.basic.as_ref().unwrap();
        basic
            .verify(&f.ca.ocsp_signer.info().public_key)
            .unwrap();
        assert_eq!(basic.nonce, request.nonce.as_ref().map(Extension::value_der));
        assert_eq!(response.find(&good).unwrap().status, CertStatus::Good);
        assert!(matches!(
            response.find(&revoked).unwrap().status,
            CertStatus::Revoked {
                reason: Some(RevocationReason::KeyCompromise),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_serial_is_internal_error() {
        let f = fixture().await;
        let request = OcspRequest::new(vec![CertId::new(&f.ca.root, &Serial::generate())]);
        let der = f.responder.handle(&request.to_der()).await;
        assert_eq!(der, error_response(OcspResponseStatus::InternalError));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let f = fixture().await;
        let der = f.responder.handle(b"not DER").await;
        assert_eq!(der, error_response(OcspResponseStatus::MalformedRequest));
        let der = f.responder.handle(&[]).await;
        assert_eq!(der, error_response(OcspResponseStatus::MalformedRequest));
    }
}
