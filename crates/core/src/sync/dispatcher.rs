//! Batch dispatcher
//!
//! Groups ready operations by type, applies each type's batch cap and hands
//! the group to the handler registered for the type's handling mode.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shiftsync_domain::{HandlingMode, Operation, OperationType, SyncStrategy};
use tracing::{debug, instrument};

use super::handlers::{
    BatchedHandler, IndividualHandler, MergeHandler, OperationResult, TypeHandler,
};
use super::ports::Submitter;
use super::strategies::StrategyRegistry;

/// Operations of one type bound for a single handler invocation
#[derive(Debug, Clone)]
pub struct DispatchGroup {
    pub op_type: OperationType,
    pub strategy: SyncStrategy,
    pub operations: Vec<Operation>,
}

/// Output of [`plan_groups`]
#[derive(Debug, Default)]
pub struct DispatchPlan {
    /// Ordered by each group's highest-ranked member
    pub groups: Vec<DispatchGroup>,
    /// Ready but beyond the type's batch cap; left pending
    pub over_cap: Vec<Operation>,
}

/// Partition globally sorted operations into capped per-type groups
///
/// `ready` must already be sorted by priority then age; group order and
/// in-group order both follow it.
pub fn plan_groups(ready: Vec<Operation>, strategies: &StrategyRegistry) -> DispatchPlan {
    let mut plan = DispatchPlan::default();
    let mut slots: HashMap<OperationType, usize> = HashMap::new();

    for operation in ready {
        let index = match slots.get(&operation.op_type) {
            Some(index) => *index,
            None => {
                let strategy = strategies.strategy_for(&operation.op_type);
                plan.groups.push(DispatchGroup {
                    op_type: operation.op_type.clone(),
                    strategy,
                    operations: Vec::new(),
                });
                let index = plan.groups.len() - 1;
                slots.insert(operation.op_type.clone(), index);
                index
            }
        };

        let group = &mut plan.groups[index];
        if group.operations.len() < group.strategy.batch_size.max(1) {
            group.operations.push(operation);
        } else {
            plan.over_cap.push(operation);
        }
    }

    plan
}

/// Routes each group to the handler for its handling mode
pub struct BatchDispatcher {
    handlers: HashMap<HandlingMode, Arc<dyn TypeHandler>>,
    submitter: Arc<dyn Submitter>,
    timeout: Duration,
}

impl BatchDispatcher {
    /// Dispatcher with the built-in handlers over `submitter`
    pub fn new(submitter: Arc<dyn Submitter>, timeout: Duration) -> Self {
        let mut handlers: HashMap<HandlingMode, Arc<dyn TypeHandler>> = HashMap::new();
        for handler in [
            Arc::new(IndividualHandler) as Arc<dyn TypeHandler>,
            Arc::new(BatchedHandler),
            Arc::new(MergeHandler),
        ] {
            handlers.insert(handler.mode(), handler);
        }
        Self { handlers, submitter, timeout }
    }

    /// Replace the handler for one handling mode
    pub fn with_handler(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.handlers.insert(handler.mode(), handler);
        self
    }

    /// Submit one group; every operation in it gets exactly one result
    #[instrument(skip(self, group), fields(op_type = %group.op_type, count = group.operations.len()))]
    pub async fn dispatch(&self, group: DispatchGroup) -> Vec<OperationResult> {
        let mode = group.strategy.handling;
        let handler = self
            .handlers
            .get(&mode)
            .cloned()
            .unwrap_or_else(|| Arc::new(IndividualHandler) as Arc<dyn TypeHandler>);

        debug!(%mode, "dispatching group");
        handler.handle(&group.op_type, group.operations, self.submitter.as_ref(), self.timeout).await
    }
}
