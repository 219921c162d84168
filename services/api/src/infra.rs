use metrics_exporter_prometheus::PrometheusHandle;
use return_portal::workflows::returns::{
    RepositoryError, ReturnId, ReturnRecord, ReturnRepository, ReturnStatus,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local return store; records are lost on restart.
#[derive(Default, Clone)]
pub(crate) struct InMemoryReturnRepository {
    records: Arc<Mutex<HashMap<ReturnId, ReturnRecord>>>,
}

impl InMemoryReturnRepository {
    fn records(&self) -> MutexGuard<'_, HashMap<ReturnId, ReturnRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReturnRepository for InMemoryReturnRepository {
    fn insert(&self, record: ReturnRecord) -> Result<ReturnRecord, RepositoryError> {
        let mut guard = self.records();
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ReturnRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records();
        match guard.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ReturnId) -> Result<Option<ReturnRecord>, RepositoryError> {
        Ok(self.records().get(id).cloned())
    }

    fn list(&self, status: Option<ReturnStatus>) -> Result<Vec<ReturnRecord>, RepositoryError> {
        let mut records: Vec<ReturnRecord> = self
            .records()
            .values()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }
}
