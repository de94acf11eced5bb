//! Storage traits for CA records and process configuration.
//!
//! All repository operations are async so that database-backed
//! implementations can be swapped in without touching the service.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CertificateRecord, CrlLocation, Request, Revoked, Template};

#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Approved requests still in `Processing`, ordered by id
    async fn pending_requests(&self) -> Result<Vec<Request>>;

    async fn get_request(&self, id: u64) -> Result<Request>;

    /// Persist the request's status, reasons and comments
    async fn update_request(&self, request: &Request) -> Result<()>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn get_template(&self, id: u64) -> Result<Template>;
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn certificate_for_request(&self, request_id: u64) -> Result<Option<CertificateRecord>>;

    async fn certificate_by_serial(&self, serial: &str) -> Result<Option<CertificateRecord>>;

    /// Fails with `CertificateExists` on a duplicate serial
    async fn insert_certificate(&self, record: CertificateRecord) -> Result<()>;
}

#[async_trait]
pub trait RevokedRepository: Send + Sync {
    async fn revoked_by_serial(&self, serial: &str) -> Result<Option<Revoked>>;

    async fn list_revoked(&self) -> Result<Vec<Revoked>>;

    /// Fails unless the certificate exists and is not already revoked
    async fn insert_revoked(&self, revoked: Revoked) -> Result<()>;
}

#[async_trait]
pub trait CrlLocationRepository: Send + Sync {
    /// Locations that are not deleted
    async fn active_crl_locations(&self) -> Result<Vec<CrlLocation>>;

    async fn add_certificate_to_location(&self, location_id: u64, serial: &str) -> Result<()>;
}

/// Process-wide key/value configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_value(&self, name: &str) -> Result<Option<String>>;

    async fn set_value(&self, name: &str, value: &str) -> Result<()>;
}

/// Everything the issuance service reads and writes
pub trait CaRepository:
    RequestRepository
    + TemplateRepository
    + CertificateRepository
    + RevokedRepository
    + CrlLocationRepository
    + ConfigStore
{
}

impl<T> CaRepository for T where
    T: RequestRepository
        + TemplateRepository
        + CertificateRepository
        + RevokedRepository
        + CrlLocationRepository
        + ConfigStore
{
}
