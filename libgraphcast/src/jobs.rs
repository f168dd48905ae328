//! Tracking of in-flight publish runs
//!
//! The store is owned by the caller and handed to the [`crate::Publisher`];
//! nothing here is global. Records live only as long as the store does.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{Platform, PublishResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Validating,
    CreatingContainers,
    WaitingForContainer,
    Publishing,
    Done,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStage::Validating => "validating",
            JobStage::CreatingContainers => "creating_containers",
            JobStage::WaitingForContainer => "waiting_for_container",
            JobStage::Publishing => "publishing",
            JobStage::Done => "done",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub request_id: String,
    pub platform: Platform,
    pub stage: JobStage,
    pub container_ids: Vec<String>,
    pub updated_at: i64,
    pub result: Option<PublishResult>,
}

impl JobRecord {
    pub fn new(request_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            request_id: request_id.into(),
            platform,
            stage: JobStage::Validating,
            container_ids: Vec::new(),
            updated_at: chrono::Utc::now().timestamp(),
            result: None,
        }
    }
}

/// Repository of runs keyed by request id
pub trait JobStore: Send + Sync {
    fn insert(&self, record: JobRecord);

    fn get(&self, request_id: &str) -> Option<JobRecord>;

    /// Apply `change` to an existing record. Returns false if there is none.
    fn update(&self, request_id: &str, change: &mut dyn FnMut(&mut JobRecord)) -> bool;

    fn delete(&self, request_id: &str) -> Option<JobRecord>;
}

#[derive(Default)]
pub struct MemoryJobStore {
    records: Mutex<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, record: JobRecord) {
        self.lock().insert(record.request_id.clone(), record);
    }

    fn get(&self, request_id: &str) -> Option<JobRecord> {
        self.lock().get(request_id).cloned()
    }

    fn update(&self, request_id: &str, change: &mut dyn FnMut(&mut JobRecord)) -> bool {
        match self.lock().get_mut(request_id) {
            Some(record) => {
                change(record);
                record.updated_at = chrono::Utc::now().timestamp();
                true
            }
            None => false,
        }
    }

    fn delete(&self, request_id: &str) -> Option<JobRecord> {
        self.lock().remove(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_update_delete() {
        let store = MemoryJobStore::new();
        assert!(store.is_empty());

        store.insert(JobRecord::new("R1", Platform::Instagram));
        assert_eq!(store.get("R1").unwrap().stage, JobStage::Validating);

        let updated = store.update("R1", &mut |record| {
            record.stage = JobStage::WaitingForContainer;
            record.container_ids.push("C1".to_string());
        });
        assert!(updated);

        let record = store.get("R1").unwrap();
        assert_eq!(record.stage, JobStage::WaitingForContainer);
        assert_eq!(record.container_ids, vec!["C1"]);

        assert!(store.delete("R1").is_some());
        assert!(store.get("R1").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_update_unknown_record() {
        let store = MemoryJobStore::new();
        assert!(!store.update("missing", &mut |record| record.stage = JobStage::Done));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(JobStage::CreatingContainers.to_string(), "creating_containers");
    }
}
