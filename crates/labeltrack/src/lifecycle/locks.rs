use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::store::JobId;

/// Hands out one mutex per job so transitions on the same job run one at a
/// time while different jobs proceed independently.
#[derive(Debug, Default)]
pub(crate) struct JobLocks {
    locks: Mutex<HashMap<JobId, Arc<Mutex<()>>>>,
}

impl JobLocks {
    pub(crate) fn handle(&self, job_id: JobId) -> Arc<Mutex<()>> {
        // The map holds no invariant a panicking holder could break.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(job_id).or_default())
    }

    pub(crate) fn forget(&self, job_id: JobId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(&job_id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Locks a job handle. A poisoned job lock is taken over: every store write
/// is atomic, so a panicking holder cannot leave half a transition behind.
pub(crate) fn lock_job(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_job_shares_handle() {
        let locks = JobLocks::default();
        let a = locks.handle(1);
        let b = locks.handle(1);
        let c = locks.handle(2);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_forget_drops_entry() {
        let locks = JobLocks::default();
        let _ = locks.handle(7);
        locks.forget(7);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_poisoned_job_lock_is_recovered() {
        let locks = JobLocks::default();
        let handle = locks.handle(3);
        let poisoner = Arc::clone(&handle);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("operator closed the terminal");
        })
        .join();
        assert!(handle.is_poisoned());
        let _guard = lock_job(&handle);
    }
}
