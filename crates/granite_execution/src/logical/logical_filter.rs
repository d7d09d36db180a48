use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use parking_lot::RwLock;
use std::fmt;

/// How the physical layer will evaluate a filter over a stored table.
/// Starts as `TableScan`; the index-scan rule flips eligible filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    TableScan,
    IndexScan,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::TableScan => write!(f, "TableScan"),
            ScanType::IndexScan => write!(f, "IndexScan"),
        }
    }
}

#[derive(Debug)]
pub struct LogicalFilter {
    pub predicate: Expression,
    scan_type: RwLock<ScanType>,
}

impl LogicalFilter {
    pub fn make(predicate: Expression, input: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Filter(LogicalFilter {
                predicate,
                scan_type: RwLock::new(ScanType::TableScan),
            }),
            Some(input),
            None,
        )
    }

    pub fn with_scan_type(predicate: Expression, scan_type: ScanType) -> LogicalFilter {
        LogicalFilter {
            predicate,
            scan_type: RwLock::new(scan_type),
        }
    }

    pub fn scan_type(&self) -> ScanType {
        *self.scan_type.read()
    }

    pub fn set_scan_type(&self, scan_type: ScanType) {
        *self.scan_type.write() = scan_type;
    }
}

impl Clone for LogicalFilter {
    fn clone(&self) -> Self {
        LogicalFilter {
            predicate: self.predicate.clone(),
            scan_type: RwLock::new(self.scan_type()),
        }
    }
}

impl PartialEq for LogicalFilter {
    fn eq(&self, other: &Self) -> bool {
        self.predicate == other.predicate && self.scan_type() == other.scan_type()
    }
}

impl Explainable for LogicalFilter {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Filter")
            .with_value("predicate", &self.predicate)
            .with_value("scan", self.scan_type())
    }
}
