//! Index key layout and paginated lookup over it
//!
//! Index keys carry four segments after the namespace:
//! `workerType | organizationId | applicationTypeId | workerId`.
//! A lookup filters on a left-to-right prefix of the first three.

use crate::core::{RegistryError, Result, Worker, WorkerLookupPage};
use crate::storage::ScanPage;
use crate::storage::composite_key::{encode_bookmark, format_numeric, format_text};

/// Filter value that means "any" for a text field.
pub const WILDCARD: &str = "0";

/// Segments of the index key for one `(worker, application type)` pair.
pub fn index_attributes(worker: &Worker, application_type_id: &str) -> Vec<String> {
    vec![
        format_numeric(worker.worker_type),
        format_text(&worker.organization_id),
        format_text(application_type_id),
        format_text(&worker.worker_id),
    ]
}

/// The three lookup criteria, AND-ed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFilter {
    pub worker_type: u64,
    pub organization_id: String,
    pub application_type_id: String,
}

impl LookupFilter {
    pub fn new(worker_type: u64, organization_id: impl Into<String>, application_type_id: impl Into<String>) -> Self {
        Self {
            worker_type,
            organization_id: organization_id.into(),
            application_type_id: application_type_id.into(),
        }
    }

    /// Matches every indexed worker.
    pub fn all() -> Self {
        Self::new(0, WILDCARD, WILDCARD)
    }

    /// Parse raw call arguments; `worker_type` must be an unsigned integer.
    pub fn parse(worker_type: &str, organization_id: &str, application_type_id: &str) -> Result<Self> {
        let worker_type = worker_type
            .parse::<u64>()
            .map_err(|_| RegistryError::Validation("Worker Type must be an integer".into()))?;
        Ok(Self::new(worker_type, organization_id, application_type_id))
    }

    /// Key segments to scan under.
    ///
    /// A field takes part only if it is not a wildcard and every field to its
    /// left took part, so a wildcard truncates the filter at that position.
    pub fn segments(&self) -> Vec<String> {
        let mut segments = Vec::with_capacity(3);
        if self.worker_type == 0 {
            return segments;
        }
        segments.push(format_numeric(self.worker_type));

        if self.organization_id == WILDCARD {
            return segments;
        }
        segments.push(format_text(&self.organization_id));

        if self.application_type_id != WILDCARD {
            segments.push(format_text(&self.application_type_id));
        }
        segments
    }
}

/// Turn a scan fetched with `page_size + 1` entries into a response page.
///
/// When the probe entry beyond `page_size` came back, its key becomes the
/// lookup tag so the next call resumes exactly at the first id not returned.
pub fn collect_page(scan: ScanPage, page_size: usize) -> WorkerLookupPage {
    let mut entries = scan.entries.into_iter();
    let ids: Vec<String> = entries
        .by_ref()
        .take(page_size)
        .map(|(_, value)| String::from_utf8_lossy(&value).into_owned())
        .collect();

    let lookup_tag = match entries.next() {
        Some((probe_key, _)) => encode_bookmark(&probe_key),
        None => scan.bookmark,
    };

    WorkerLookupPage {
        total_count: ids.len() as u64,
        lookup_tag,
        ids,
    }
}
