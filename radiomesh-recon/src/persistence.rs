//! Request tracking port.
//!
//! The reconstruction core never touches storage itself; callers record the
//! submitted image and the final outcome through a [`PersistenceGateway`].

use crate::analysis::TissueCategory;
use crate::config::ReconstructionParams;
use radiomesh_data::MeshStatistics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

pub type RecordId = u64;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("No record with id {0}")]
    NotFound(RecordId),

    #[error("Record store lock poisoned")]
    Poisoned,
}

/// What was submitted for reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Source description, usually a file name.
    pub name: String,
    pub params: ReconstructionParams,
}

/// Condensed result of a successful reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionSummary {
    pub statistics: MeshStatistics,
    pub detected_category: TissueCategory,
    pub regions_detected: usize,
    pub abnormalities_detected: usize,
    pub from_template: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum ReconstructionOutcome {
    Completed(ReconstructionSummary),
    Failed { message: String },
}

/// Everything known about one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub image: ImageMetadata,
    /// `None` while the request is still being processed.
    pub reconstruction: Option<ReconstructionOutcome>,
}

pub trait PersistenceGateway: Send + Sync {
    /// Record a new request and return its id.
    fn store(&self, image: ImageMetadata) -> Result<RecordId, PersistenceError>;

    /// Attach the outcome of the request `id`, replacing any earlier one.
    fn record_reconstruction(
        &self,
        id: RecordId,
        outcome: ReconstructionOutcome,
    ) -> Result<(), PersistenceError>;

    fn fetch_status(&self, id: RecordId) -> Result<RequestStatus, PersistenceError>;
}

/// Process-local gateway backed by a locked map.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    next_id: AtomicU64,
    records: RwLock<HashMap<RecordId, RequestStatus>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored requests. Still readable after a writer panicked.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn store(&self, image: ImageMetadata) -> Result<RecordId, PersistenceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut records = self.records.write().map_err(|_| PersistenceError::Poisoned)?;
        debug!("Stored request {} for '{}'", id, image.name);
        records.insert(
            id,
            RequestStatus {
                image,
                reconstruction: None,
            },
        );
        Ok(id)
    }

    fn record_reconstruction(
        &self,
        id: RecordId,
        outcome: ReconstructionOutcome,
    ) -> Result<(), PersistenceError> {
        let mut records = self.records.write().map_err(|_| PersistenceError::Poisoned)?;
        let status = records.get_mut(&id).ok_or(PersistenceError::NotFound(id))?;
        status.reconstruction = Some(outcome);
        Ok(())
    }

    fn fetch_status(&self, id: RecordId) -> Result<RequestStatus, PersistenceError> {
        let records = self.records.read().map_err(|_| PersistenceError::Poisoned)?;
        records.get(&id).cloned().ok_or(PersistenceError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn metadata(name: &str) -> ImageMetadata {
        ImageMetadata {
            name: name.to_string(),
            params: ReconstructionParams::default(),
        }
    }

    #[test]
    fn test_store_and_fetch() {
        let gateway = InMemoryGateway::new();
        let a = gateway.store(metadata("a.png")).unwrap();
        let b = gateway.store(metadata("b.png")).unwrap();
        assert!(b > a);
        assert_eq!(gateway.len(), 2);

        let status = gateway.fetch_status(a).unwrap();
        assert_eq!(status.image.name, "a.png");
        assert!(status.reconstruction.is_none());
    }

    #[test]
    fn test_record_outcome() {
        let gateway = InMemoryGateway::new();
        let id = gateway.store(metadata("scan.png")).unwrap();
        let summary = ReconstructionSummary {
            statistics: MeshStatistics {
                vertices: 10,
                faces: 16,
            },
            detected_category: TissueCategory::Brain,
            regions_detected: 3,
            abnormalities_detected: 0,
            from_template: false,
        };
        gateway
            .record_reconstruction(id, ReconstructionOutcome::Completed(summary.clone()))
            .unwrap();
        assert_eq!(
            gateway.fetch_status(id).unwrap().reconstruction,
            Some(ReconstructionOutcome::Completed(summary))
        );
    }

    #[test]
    fn test_len_counts_through_poisoned_lock() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.store(metadata("a.png")).unwrap();
        let writer = Arc::clone(&gateway);
        let joined = std::thread::spawn(move || {
            let _guard = writer.records.write().unwrap();
            panic!("writer failed mid-update");
        })
        .join();
        assert!(joined.is_err());
        assert!(gateway.records.is_poisoned());

        assert_eq!(gateway.len(), 1);
        assert!(!gateway.is_empty());
        assert!(matches!(gateway.fetch_status(1), Err(PersistenceError::Poisoned)));
    }

    #[test]
    fn test_unknown_id() {
        let gateway = InMemoryGateway::new();
        assert!(matches!(gateway.fetch_status(7), Err(PersistenceError::NotFound(7))));
        let failed = ReconstructionOutcome::Failed {
            message: "bad".to_string(),
        };
        assert!(matches!(
            gateway.record_reconstruction(7, failed),
            Err(PersistenceError::NotFound(7))
        ));
    }

    #[test]
    fn test_concurrent_stores_get_unique_ids() {
        let gateway = Arc::new(InMemoryGateway::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let gateway = Arc::clone(&gateway);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|i| gateway.store(metadata(&format!("{t}-{i}"))).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<RecordId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(gateway.len(), 200);
    }
}
