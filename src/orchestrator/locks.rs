//! Per-service run locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as RunLock;

/// Maps service ids to the lock serializing their runs.
///
/// Locks are created on first use and never removed, so two callers asking
/// for the same service always contend on the same lock.
#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<RunLock<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `service`, created if needed.
    pub fn get(&self, service: &str) -> Arc<RunLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(service.to_string()).or_default().clone()
    }

    /// Number of services that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_service_same_lock() {
        let table = LockTable::new();
        let a = table.get("smb");
        let b = table.get("smb");
        let c = table.get("nfs");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_excludes_same_service_only() {
        let table = LockTable::new();
        let _smb = table.get("smb").lock_owned().await;
        assert!(table.get("smb").try_lock().is_err());
        assert!(table.get("nfs").try_lock().is_ok());
    }
}
