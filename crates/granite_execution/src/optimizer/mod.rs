//! Rule-based plan rewriting.
//!
//! Rules run under a sentinel root node so the topmost real node can be
//! replaced through the ordinary rewiring machinery. The driver applies the
//! rule list until a full pass reports no change, bounded by
//! [`MAX_OPTIMIZER_PASSES`].

pub mod column_prune;
pub mod expression_rewrite;
pub mod filter_pushdown;
pub mod index_scan;
pub mod join_detection;
pub mod predicate_reordering;

pub use column_prune::ColumnPruningRule;
pub use expression_rewrite::ExpressionRewriteRule;
pub use filter_pushdown::FilterPushdownRule;
pub use index_scan::IndexScanRule;
pub use join_detection::JoinDetectionRule;
pub use predicate_reordering::PredicateReorderingRule;

use crate::logical::{LogicalRoot, NodeRef};
use granite_error::{GraniteError, Result};
use std::fmt;
use tracing::trace;

pub const MAX_OPTIMIZER_PASSES: usize = 10;

pub trait OptimizerRule: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Rewrite the plan hanging off `root` (the sentinel) in place. Returns
    /// whether anything changed; the driver iterates to a fixpoint.
    fn apply(&self, root: &NodeRef) -> Result<bool>;
}

#[derive(Debug)]
pub struct Optimizer {
    rules: Vec<Box<dyn OptimizerRule>>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    pub fn new() -> Optimizer {
        Optimizer {
            rules: vec![
                Box::new(ExpressionRewriteRule),
                Box::new(JoinDetectionRule),
                Box::new(FilterPushdownRule),
                Box::new(PredicateReorderingRule),
                Box::new(IndexScanRule),
                Box::new(ColumnPruningRule),
            ],
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn OptimizerRule>>) -> Optimizer {
        Optimizer { rules }
    }

    pub fn optimize(&self, plan: NodeRef) -> Result<NodeRef> {
        let root = LogicalRoot::make(plan);

        for _pass in 0..MAX_OPTIMIZER_PASSES {
            let mut changed = false;
            for rule in &self.rules {
                let rule_changed = rule.apply(&root)?;
                if rule_changed {
                    trace!(rule = rule.name(), "optimizer rule changed the plan");
                }
                changed |= rule_changed;
            }
            if !changed {
                break;
            }
        }

        let optimized = root
            .left_input()
            .ok_or_else(|| GraniteError::optimizer("rule detached the plan from the root"))?;
        root.set_left_input(None);
        Ok(optimized)
    }

    /// Run a single rule over a plan, for tests.
    pub fn apply_rule(rule: &dyn OptimizerRule, plan: NodeRef) -> Result<NodeRef> {
        let root = LogicalRoot::make(plan);
        rule.apply(&root)?;
        let optimized = root
            .left_input()
            .ok_or_else(|| GraniteError::optimizer("rule detached the plan from the root"))?;
        root.set_left_input(None);
        Ok(optimized)
    }
}
