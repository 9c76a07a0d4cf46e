use super::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a registered worker. Stored as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum WorkerStatus {
    #[default]
    Active,
    Offline,
    Decommissioned,
    Compromised,
}

impl WorkerStatus {
    pub fn code(self) -> u64 {
        match self {
            Self::Active => 1,
            Self::Offline => 2,
            Self::Decommissioned => 3,
            Self::Compromised => 4,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Active),
            2 => Some(Self::Offline),
            3 => Some(Self::Decommissioned),
            4 => Some(Self::Compromised),
            _ => None,
        }
    }
}

impl TryFrom<u64> for WorkerStatus {
    type Error = String;

    fn try_from(code: u64) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown worker status code {}", code))
    }
}

impl From<WorkerStatus> for u64 {
    fn from(status: WorkerStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Offline => "offline",
            Self::Decommissioned => "decommissioned",
            Self::Compromised => "compromised",
        };
        write!(f, "{label}")
    }
}

/// A worker record as persisted under its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    #[serde(rename = "workerID")]
    pub worker_id: String,
    #[serde(rename = "workerType")]
    pub worker_type: u64,
    #[serde(rename = "organizationID")]
    pub organization_id: String,
    #[serde(rename = "applicationTypeId", default, skip_serializing_if = "Vec::is_empty")]
    pub application_type_ids: Vec<String>,
    pub details: String,
    #[serde(default)]
    pub status: WorkerStatus,
}

impl Worker {
    pub fn new(
        worker_id: impl Into<String>,
        worker_type: u64,
        organization_id: impl Into<String>,
        application_type_ids: Vec<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_type,
            organization_id: organization_id.into(),
            application_type_ids,
            details: details.into(),
            status: WorkerStatus::Active,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_id.is_empty() {
            return Err(RegistryError::Validation("workerID must not be empty".into()));
        }
        if self.application_type_ids.iter().any(|app| app.is_empty()) {
            return Err(RegistryError::Validation(format!(
                "Worker '{}' lists an empty application type id",
                self.worker_id
            )));
        }

        let keyed_fields = std::iter::once(&self.worker_id)
            .chain(std::iter::once(&self.organization_id))
            .chain(self.application_type_ids.iter());
        for field in keyed_fields {
            if field.contains('\u{0}') {
                return Err(RegistryError::Validation(format!(
                    "{:?} contains a NUL character and cannot be indexed",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Application type ids in declaration order with repeats removed.
    pub fn distinct_application_types(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.application_type_ids.len());
        for app in &self.application_type_ids {
            if !seen.contains(&app.as_str()) {
                seen.push(app.as_str());
            }
        }
        seen
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Projection returned by `retrieve`; the id is the lookup key and is left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRetrieval {
    pub status: WorkerStatus,
    #[serde(rename = "workerType")]
    pub worker_type: u64,
    #[serde(rename = "organizationID")]
    pub organization_id: String,
    #[serde(rename = "applicationTypeId", default, skip_serializing_if = "Vec::is_empty")]
    pub application_type_ids: Vec<String>,
    pub details: String,
}

impl From<Worker> for WorkerRetrieval {
    fn from(worker: Worker) -> Self {
        Self {
            status: worker.status,
            worker_type: worker.worker_type,
            organization_id: worker.organization_id,
            application_type_ids: worker.application_type_ids,
            details: worker.details,
        }
    }
}

/// One page of lookup results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLookupPage {
    #[serde(rename = "totalCount")]
    pub total_count: u64,
    #[serde(rename = "lookupTag")]
    pub lookup_tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
}

impl WorkerLookupPage {
    pub fn has_more(&self) -> bool {
        !self.lookup_tag.is_empty()
    }
}
