//! The issuance poller.
//!
//! Each cycle signs certificates for approved requests and regenerates the
//! CRL when it is due. Cycles never overlap and share nothing but the
//! persisted records; every per-request failure ends in a terminal request
//! status instead of aborting the batch.

mod crl;

use std::convert::Infallible;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use webca_core::repository::CaRepository;
use webca_core::{CertificateRecord, Request, RequestStatus, SigningRole};
use webca_crypto::{
    build_extensions, create_certificate, create_certificate_request, AssemblyContext,
    CertificateRequest, CryptoError, Issuer, Serial, Validity,
};

use crate::certstore::StoreRegistry;
use crate::settings::ServiceConfig;
use crate::signing::{load_signing_pair, SigningPair};
use crate::{Result, ServiceError};

/// Key pairs loaded at the start of a batch
#[derive(Debug)]
pub struct SigningKeys {
    pub cert: SigningPair,
    pub crl: SigningPair,
    pub csr: SigningPair,
}

/// What happened to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Issued,
    /// A certificate already existed; nothing was signed
    AlreadyIssued,
    Rejected,
    Failed,
}

/// Tally of one `process_requests` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestReport {
    pub issued: usize,
    pub already_issued: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl RequestReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Issued => self.issued += 1,
            Outcome::AlreadyIssued => self.already_issued += 1,
            Outcome::Rejected => self.rejected += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Result of one polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub requests: RequestReport,
    pub crl_published: bool,
    /// CRL regeneration failed; the failure is recorded in the CRL status
    pub crl_failed: bool,
}

impl CycleReport {
    /// Whether the cycle wrote anything to the repository
    #[must_use]
    pub fn changed(&self) -> bool {
        self.crl_published || self.crl_failed || self.requests != RequestReport::default()
    }
}

/// Why a request did not get a certificate
enum Failure {
    Rejected(String),
    Error(String),
}

impl Failure {
    fn error(stage: &str, err: impl std::fmt::Display) -> Self {
        Self::Error(format!("{stage}: {err}"))
    }

    /// Policy violations reject; anything else is an error
    fn classify(stage: &str, err: ServiceError) -> Self {
        match err.policy_message() {
            Some(reason) => Self::Rejected(reason.to_string()),
            None => Self::error(stage, err),
        }
    }
}

/// Strip the data directory from a diagnostic
fn redact(message: &str, base_dir: &Path) -> String {
    let base = base_dir.to_string_lossy();
    if base.is_empty() || base == "." {
        return message.to_string();
    }
    message.replace(base.as_ref(), "")
}

/// Polling service that turns approved requests into certificates
pub struct IssuanceService {
    repo: Arc<dyn CaRepository>,
    stores: StoreRegistry,
    config: ServiceConfig,
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService")
            .field("stores", &self.stores)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IssuanceService {
    pub fn new(repo: Arc<dyn CaRepository>, stores: StoreRegistry, config: ServiceConfig) -> Self {
        Self {
            repo,
            stores,
            config,
        }
    }

    /// Poll until the task is dropped.
    ///
    /// Sleeps for the configured interval before every cycle; a cycle always
    /// runs to completion before the next sleep starts.
    pub async fn run(&self) {
        let stopped = self
            .run_with(|_| async { Ok::<(), Infallible>(()) })
            .await;
        match stopped {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Poll like [`run`](Self::run), handing every report to `after_cycle`.
    ///
    /// Stops with the first error `after_cycle` returns.
    pub async fn run_with<F, Fut, E>(&self, mut after_cycle: F) -> std::result::Result<(), E>
    where
        F: FnMut(CycleReport) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
    {
        info!(
            interval_ms = self.config.poll_interval_ms,
            data_dir = %self.config.data_dir.display(),
            "CA service started"
        );
        loop {
            tokio::time::sleep(self.config.poll_interval()).await;
            after_cycle(self.run_cycle().await).await?;
        }
    }

    /// One complete cycle: requests first, then the CRL
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        match self.process_requests().await {
            Ok(requests) => report.requests = requests,
            Err(e) => error!(error = %e, "request processing skipped this cycle"),
        }
        match self.check_crl().await {
            Ok(published) => report.crl_published = published,
            Err(e) => {
                error!(error = %e, "CRL regeneration failed");
                report.crl_failed = true;
            }
        }
        report
    }

    /// Load the certificate, CRL and CSR signing pairs
    pub async fn load_signing_keys(&self) -> Result<SigningKeys> {
        let repo = &*self.repo;
        Ok(SigningKeys {
            cert: load_signing_pair(repo, &self.stores, SigningRole::CertSign).await?,
            crl: load_signing_pair(repo, &self.stores, SigningRole::CrlSign).await?,
            csr: load_signing_pair(repo, &self.stores, SigningRole::CsrSign).await?,
        })
    }

    /// CRL URLs and OCSP URL advertised in new certificates
    pub async fn assembly_context(&self) -> Result<AssemblyContext> {
        let crl_urls = self
            .repo
            .active_crl_locations()
            .await?
            .into_iter()
            .map(|l| l.url)
            .collect();
        Ok(AssemblyContext {
            crl_urls,
            ocsp_url: self.config.ocsp_url.clone(),
        })
    }

    /// Issue certificates for every approved request still processing.
    ///
    /// Fails only when the batch cannot start (signing keys unresolved,
    /// store unreachable); individual requests never fail the batch.
    pub async fn process_requests(&self) -> Result<RequestReport> {
        let pending = self.repo.pending_requests().await?;
        let mut report = RequestReport::default();
        if pending.is_empty() {
            return Ok(report);
        }
        let keys = self.load_signing_keys().await?;
        let ctx = self.assembly_context().await?;

        for request in pending {
            let id = request.id;
            match self.process_request(request, &keys, &ctx).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(request_id = id, error = %e, "could not record request outcome");
                    report.record(Outcome::Failed);
                }
            }
        }
        info!(
            issued = report.issued,
            rejected = report.rejected,
            failed = report.failed,
            "processed requests"
        );
        Ok(report)
    }

    /// Process one request and persist its new status.
    ///
    /// A request that already has a certificate is only marked issued.
    pub async fn process_request(
        &self,
        mut request: Request,
        keys: &SigningKeys,
        ctx: &AssemblyContext,
    ) -> Result<Outcome> {
        info!(request_id = request.id, user = %request.user, "got a certificate request");
        if self.repo.certificate_for_request(request.id).await?.is_some() {
            debug!(request_id = request.id, "certificate already issued");
            request.status = RequestStatus::Issued;
            self.repo.update_request(&request).await?;
            return Ok(Outcome::AlreadyIssued);
        }

        let outcome = match self.issue(&request, keys, ctx).await {
            Ok(record) => {
                let serial = record.serial.clone();
                match self.repo.insert_certificate(record).await {
                    Ok(()) => {
                        request.status = RequestStatus::Issued;
                        self.register_with_crl_locations(&serial).await;
                        info!(request_id = request.id, serial = %serial, "certificate issued");
                        Outcome::Issued
                    }
                    Err(e) => {
                        let comment = format!("Error saving certificate: {e}");
                        warn!(request_id = request.id, error = %e, "certificate not stored");
                        request.fail(redact(&comment, &self.config.data_dir));
                        Outcome::Failed
                    }
                }
            }
            Err(Failure::Rejected(reason)) => {
                warn!(request_id = request.id, reason = %reason, "request rejected");
                request.reject(reason);
                Outcome::Rejected
            }
            Err(Failure::Error(comment)) => {
                warn!(request_id = request.id, error = %comment, "request failed");
                request.fail(redact(&comment, &self.config.data_dir));
                Outcome::Failed
            }
        };
        self.repo.update_request(&request).await?;
        Ok(outcome)
    }

    async fn issue(
        &self,
        request: &Request,
        keys: &SigningKeys,
        ctx: &AssemblyContext,
    ) -> std::result::Result<CertificateRecord, Failure> {
        let template = self
            .repo
            .get_template(request.template_id)
            .await
            .map_err(|e| Failure::error("Error loading template", e))?;
        let csr = CertificateRequest::from_pem(&request.csr)
            .map_err(|e| Failure::error("Error reading request CSR", e))?;

        let assembled = build_extensions(&template, request, ctx)
            .map_err(|e| Failure::classify("Error building extensions", e.into()))?;
        // Template minimums may have been raised since submission
        csr.check_against(&template)
            .map_err(|e| Failure::classify("Error checking key", e.into()))?;

        let internal = create_certificate_request(
            &csr.public_key,
            &assembled.subject,
            &assembled.extensions,
            &keys.csr.key,
        )
        .map_err(|e| Failure::error("Error creating internal CSR", e))?;

        let serial = Serial::generate();
        let cert = create_certificate(
            &internal,
            Issuer::Certificate(&keys.cert.certificate, &keys.cert.key),
            &serial,
            Validity::seconds(0, template.validity_secs()),
        )
        .map_err(|e: CryptoError| Failure::error("Error creating certificate", e))?;

        let info = cert.info();
        Ok(CertificateRecord {
            serial: serial.to_hex(),
            request_id: Some(request.id),
            user: request.user.clone(),
            subject: assembled.subject.to_string(),
            valid_from: info.not_before,
            valid_to: info.not_after,
            issuer_serial: keys.cert.certificate.serial().to_hex(),
            pem: cert.to_pem(),
        })
    }

    async fn register_with_crl_locations(&self, serial: &str) {
        let locations = match self.repo.active_crl_locations().await {
            Ok(locations) => locations,
            Err(e) => {
                warn!(serial = %serial, error = %e, "could not list CRL locations");
                return;
            }
        };
        for location in locations {
            if let Err(e) = self
                .repo
                .add_certificate_to_location(location.id, serial)
                .await
            {
                warn!(serial = %serial, location = location.id, error = %e, "CRL location not updated");
            }
        }
    }
}
