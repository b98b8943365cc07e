//! Strategy and fallback registry

use std::collections::HashMap;
use std::sync::Arc;

use shiftsync_domain::{OperationType, SyncStrategy};

use super::ports::FallbackAction;

/// Per-type strategies with built-in defaults, plus optional fallbacks
///
/// Registered once at engine construction and read-only afterwards.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    overrides: HashMap<OperationType, SyncStrategy>,
    fallbacks: HashMap<OperationType, Arc<dyn FallbackAction>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the strategy for one type
    pub fn with_strategy(mut self, op_type: OperationType, strategy: SyncStrategy) -> Self {
        self.overrides.insert(op_type, strategy);
        self
    }

    /// Register the compensating action run when `op_type` fails for good
    pub fn with_fallback(mut self, op_type: OperationType, action: Arc<dyn FallbackAction>) -> Self {
        self.fallbacks.insert(op_type, action);
        self
    }

    /// Strategy for `op_type`, falling back to the built-in defaults
    pub fn strategy_for(&self, op_type: &OperationType) -> SyncStrategy {
        self.overrides
            .get(op_type)
            .cloned()
            .unwrap_or_else(|| SyncStrategy::defaults_for(op_type))
    }

    pub fn fallback_for(&self, op_type: &OperationType) -> Option<Arc<dyn FallbackAction>> {
        self.fallbacks.get(op_type).cloned()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("overrides", &self.overrides)
            .field("fallbacks", &self.fallbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}
