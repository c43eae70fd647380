// Concurrency Controller - local admission control for in-flight jobs

use crate::domain::JobId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

type ActiveSet = Arc<Mutex<HashSet<JobId>>>;

/// Tracks job ids currently executing in this process and bounds their number.
///
/// Per-process and advisory: cross-process exclusion is the store's claim.
#[derive(Clone)]
pub struct ConcurrencyController {
    limit: usize,
    active: ActiveSet,
}

/// Reserved slot; releases the job id when dropped
#[must_use = "dropping the guard releases the slot immediately"]
pub struct AdmissionGuard {
    id: JobId,
    active: ActiveSet,
}

impl AdmissionGuard {
    pub fn job_id(&self) -> &str {
        &self.id
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.id);
    }
}

fn lock(set: &ActiveSet) -> MutexGuard<'_, HashSet<JobId>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}

impl ConcurrencyController {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Reserve a slot for `id`.
    ///
    /// Returns None when the bound is reached or the id is already in flight.
    pub fn try_admit(&self, id: &str) -> Option<AdmissionGuard> {
        let mut active = lock(&self.active);
        if active.len() >= self.limit || active.contains(id) {
            return None;
        }
        active.insert(id.to_string());
        Some(AdmissionGuard {
            id: id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn size(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn free_slots(&self) -> usize {
        self.limit.saturating_sub(self.size())
    }

    pub fn is_active(&self, id: &str) -> bool {
        lock(&self.active).contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_and_release() {
        let controller = ConcurrencyController::new(2);
        let guard = controller.try_admit("a").unwrap();
        assert_eq!(controller.size(), 1);
        assert_eq!(controller.free_slots(), 1);
        assert!(controller.is_active("a"));
        assert_eq!(guard.job_id(), "a");

        drop(guard);
        assert_eq!(controller.size(), 0);
        assert!(!controller.is_active("a"));
    }

    #[test]
    fn test_bound_is_enforced() {
        let controller = ConcurrencyController::new(2);
        let _a = controller.try_admit("a").unwrap();
        let _b = controller.try_admit("b").unwrap();
        assert!(controller.try_admit("c").is_none());
        assert_eq!(controller.free_slots(), 0);
    }

    #[test]
    fn test_duplicate_id_refused() {
        let controller = ConcurrencyController::new(5);
        let _a = controller.try_admit("a").unwrap();
        assert!(controller.try_admit("a").is_none());
        assert_eq!(controller.size(), 1);
    }

    #[tokio::test]
    async fn test_release_on_panic_path() {
        let controller = ConcurrencyController::new(1);
        let guard = controller.try_admit("a").unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("processor blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(controller.size(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_never_exceed_limit() {
        let controller = ConcurrencyController::new(3);
        let mut handles = Vec::new();
        for i in 0..50 {
            let c = controller.clone();
            handles.push(tokio::spawn(async move {
                if let Some(_guard) = c.try_admit(&format!("job-{}", i)) {
                    assert!(c.size() <= 3);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(controller.size(), 0);
    }
}
