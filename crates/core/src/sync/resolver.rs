//! Dependency resolution
//!
//! An operation is ready when it has no dependencies or every dependency is
//! stored and `completed`. Unknown ids keep the dependent blocked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shiftsync_domain::{Operation, OperationStatus, Result};

use super::ports::OperationStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Waiting on dependencies that are not completed yet (or unknown).
    Blocked { waiting_on: Vec<String> },
    /// A dependency failed for good; the dependent can never run.
    DependencyFailed { dependency_id: String },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Pure readiness decision given the known status of each dependency
pub fn evaluate(
    operation: &Operation,
    statuses: &HashMap<String, OperationStatus>,
) -> Readiness {
    let mut waiting_on = Vec::new();

    for dependency in &operation.dependencies {
        match statuses.get(dependency) {
            Some(OperationStatus::Completed) => {}
            Some(OperationStatus::Failed) => {
                return Readiness::DependencyFailed { dependency_id: dependency.clone() };
            }
            Some(_) | None => waiting_on.push(dependency.clone()),
        }
    }

    if waiting_on.is_empty() {
        Readiness::Ready
    } else {
        Readiness::Blocked { waiting_on }
    }
}

/// Checks dependency state against the store
pub struct DependencyResolver {
    store: Arc<dyn OperationStore>,
}

impl DependencyResolver {
    pub fn new(store: Arc<dyn OperationStore>) -> Self {
        Self { store }
    }

    /// Readiness of a single operation
    pub async fn readiness(&self, operation: &Operation) -> Result<Readiness> {
        if operation.dependencies.is_empty() {
            return Ok(Readiness::Ready);
        }
        let statuses = self.load_statuses(std::slice::from_ref(operation)).await?;
        Ok(evaluate(operation, &statuses))
    }

    /// Readiness for a whole set, with one store round trip
    pub async fn resolve(&self, operations: &[Operation]) -> Result<HashMap<String, Readiness>> {
        let statuses = self.load_statuses(operations).await?;
        Ok(operations.iter().map(|op| (op.id.clone(), evaluate(op, &statuses))).collect())
    }

    async fn load_statuses(
        &self,
        operations: &[Operation],
    ) -> Result<HashMap<String, OperationStatus>> {
        let wanted: HashSet<&String> =
            operations.iter().flat_map(|op| op.dependencies.iter()).collect();
        if wanted.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<String> = wanted.into_iter().cloned().collect();
        let found = self.store.get_many(&ids).await?;
        Ok(found.into_iter().map(|op| (op.id, op.status)).collect())
    }
}
