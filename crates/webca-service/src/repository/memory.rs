use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use webca_core::repository::{
    CertificateRepository, ConfigStore, CrlLocationRepository, RequestRepository,
    RevokedRepository, TemplateRepository,
};
use webca_core::{
    policy, CertificateRecord, CoreError, CrlLocation, Request, Result, Revoked, Template,
};

/// Everything the in-memory repository holds; serializable as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    #[serde(default)]
    pub requests: BTreeMap<u64, Request>,
    #[serde(default)]
    pub templates: BTreeMap<u64, Template>,
    /// Keyed by lower-case hex serial
    #[serde(default)]
    pub certificates: BTreeMap<String, CertificateRecord>,
    #[serde(default)]
    pub revoked: BTreeMap<String, Revoked>,
    #[serde(default)]
    pub crl_locations: BTreeMap<u64, CrlLocation>,
    /// Key/value configuration parameters
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Repository backed by a single lock-protected [`RepositoryState`]
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<RepositoryState>,
}

fn serial_key(serial: &str) -> String {
    serial.trim().to_ascii_lowercase()
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_state(state: RepositoryState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the current state
    pub async fn state(&self) -> RepositoryState {
        self.state.read().await.clone()
    }

    /// Add or replace a template after checking its policy is consistent
    pub async fn put_template(&self, template: Template) -> Result<()> {
        policy::check_template(&template)?;
        self.state
            .write()
            .await
            .templates
            .insert(template.id, template);
        Ok(())
    }

    /// Add a request under the next free id and return that id
    pub async fn submit_request(&self, mut request: Request) -> Result<u64> {
        let mut state = self.state.write().await;
        if !state.templates.contains_key(&request.template_id) {
            return Err(CoreError::NotFound(format!(
                "template {}",
                request.template_id
            )));
        }
        let id = state.requests.keys().next_back().map_or(1, |last| last + 1);
        request.id = id;
        state.requests.insert(id, request);
        Ok(id)
    }

    pub async fn approve_request(&self, id: u64) -> Result<()> {
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("request {id}")))?;
        request.approved = true;
        Ok(())
    }

    pub async fn add_crl_location(&self, url: impl Into<String>) -> Result<u64> {
        let mut state = self.state.write().await;
        let id = state
            .crl_locations
            .keys()
            .next_back()
            .map_or(1, |last| last + 1);
        state.crl_locations.insert(id, CrlLocation::new(id, url));
        Ok(id)
    }
}

#[async_trait]
impl RequestRepository for MemoryRepository {
    async fn pending_requests(&self) -> Result<Vec<Request>> {
        Ok(self
            .state
            .read()
            .await
            .requests
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect())
    }

    async fn get_request(&self, id: u64) -> Result<Request> {
        self.state
            .read()
            .await
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("request {id}")))
    }

    async fn update_request(&self, request: &Request) -> Result<()> {
        let mut state = self.state.write().await;
        let slot = state
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", request.id)))?;
        *slot = request.clone();
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for MemoryRepository {
    async fn get_template(&self, id: u64) -> Result<Template> {
        self.state
            .read()
            .await
            .templates
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("template {id}")))
    }
}

#[async_trait]
impl CertificateRepository for MemoryRepository {
    async fn certificate_for_request(&self, request_id: u64) -> Result<Option<CertificateRecord>> {
        Ok(self
            .state
            .read()
            .await
            .certificates
            .values()
            .find(|c| c.request_id == Some(request_id))
            .cloned())
    }

    async fn certificate_by_serial(&self, serial: &str) -> Result<Option<CertificateRecord>> {
        Ok(self
            .state
            .read()
            .await
            .certificates
            .get(&serial_key(serial))
            .cloned())
    }

    async fn insert_certificate(&self, record: CertificateRecord) -> Result<()> {
        let key = serial_key(&record.serial);
        let mut state = self.state.write().await;
        if state.certificates.contains_key(&key) {
            return Err(CoreError::CertificateExists { serial: key });
        }
        state.certificates.insert(key, record);
        Ok(())
    }
}

#[async_trait]
impl RevokedRepository for MemoryRepository {
    async fn revoked_by_serial(&self, serial: &str) -> Result<Option<Revoked>> {
        Ok(self
            .state
            .read()
            .await
            .revoked
            .get(&serial_key(serial))
            .cloned())
    }

    async fn list_revoked(&self) -> Result<Vec<Revoked>> {
        Ok(self.state.read().await.revoked.values().cloned().collect())
    }

    async fn insert_revoked(&self, mut revoked: Revoked) -> Result<()> {
        let key = serial_key(&revoked.serial);
        let mut state = self.state.write().await;
        if !state.certificates.contains_key(&key) {
            return Err(CoreError::NotFound(format!("certificate {key}")));
        }
        if state.revoked.contains_key(&key) {
            return Err(CoreError::Invalid(format!("certificate {key} is already revoked")));
        }
        revoked.serial.clone_from(&key);
        state.revoked.insert(key, revoked);
        Ok(())
    }
}

#[async_trait]
impl CrlLocationRepository for MemoryRepository {
    async fn active_crl_locations(&self) -> Result<Vec<CrlLocation>> {
        Ok(self
            .state
            .read()
            .await
            .crl_locations
            .values()
            .filter(|l| !l.deleted)
            .cloned()
            .collect())
    }

    async fn add_certificate_to_location(&self, location_id: u64, serial: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let location = state
            .crl_locations
            .get_mut(&location_id)
            .ok_or_else(|| CoreError::NotFound(format!("CRL location {location_id}")))?;
        let serial = serial_key(serial);
        if !location.certificates.contains(&serial) {
            location.certificates.push(serial);
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryRepository {
    async fn get_value(&self, name: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.config.get(name).cloned())
    }

    async fn set_value(&self, name: &str, value: &str) -> Result<()> {
        self.state
            .write()
            .await
            .config
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}
