//! Pending work index
//!
//! Derived view of pending operation ids per type. The store stays the source
//! of truth; the index is rebuilt from it at start-up and kept in step with
//! every transition.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;
use shiftsync_domain::{Operation, OperationStatus, OperationType};

/// Pending operation ids keyed by type
#[derive(Debug, Default)]
pub struct PendingIndex {
    by_type: RwLock<HashMap<OperationType, HashSet<String>>>,
}

impl PendingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the index contents with the given pending operations
    pub fn rebuild(&self, pending: &[Operation]) {
        let mut by_type: HashMap<OperationType, HashSet<String>> = HashMap::new();
        for operation in pending.iter().filter(|op| op.status == OperationStatus::Pending) {
            by_type.entry(operation.op_type.clone()).or_default().insert(operation.id.clone());
        }
        *self.by_type.write() = by_type;
    }

    /// Track an operation according to its current status
    pub fn observe(&self, operation: &Operation) {
        if operation.status == OperationStatus::Pending {
            self.insert(&operation.op_type, &operation.id);
        } else {
            self.remove(&operation.op_type, &operation.id);
        }
    }

    pub fn insert(&self, op_type: &OperationType, id: &str) {
        self.by_type.write().entry(op_type.clone()).or_default().insert(id.to_string());
    }

    pub fn remove(&self, op_type: &OperationType, id: &str) {
        let mut by_type = self.by_type.write();
        if let Some(ids) = by_type.get_mut(op_type) {
            ids.remove(id);
            if ids.is_empty() {
                by_type.remove(op_type);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_type.read().values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending count per type tag, sorted by tag
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.by_type
            .read()
            .iter()
            .map(|(op_type, ids)| (op_type.as_str().to_string(), ids.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_track_counts() {
        let index = PendingIndex::new();
        index.insert(&OperationType::AuditLog, "a1");
        index.insert(&OperationType::AuditLog, "a2");
        index.insert(&OperationType::SopAccess, "s1");
        index.insert(&OperationType::AuditLog, "a1");

        assert_eq!(index.len(), 3);
        assert_eq!(index.counts().get("audit_log"), Some(&2));

        index.remove(&OperationType::SopAccess, "s1");
        assert!(!index.counts().contains_key("sop_access"));

        index.rebuild(&[]);
        assert!(index.is_empty());
    }
}
