use chrono::{DateTime, Utc};
use lab::barcode::RackBarcode;
use lab::geometry::RackPosition;

use crate::planned::{PlannedTransfer, PlannedWorklist};

/// One applied liquid transfer: the planned transfer plus the concrete
/// containers it touched, who ran it and when. Created once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTransfer {
    pub planned: PlannedTransfer,
    /// Source rack and position; dilutions draw from a reservoir instead.
    pub source: Option<(RackBarcode, RackPosition)>,
    /// Target rack; rack sample transfers cover whole sectors, so the
    /// position is absent for them.
    pub target_rack: RackBarcode,
    pub target_position: Option<RackPosition>,
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

/// The executions belonging to one planned worklist.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutedWorklist {
    pub worklist_index: usize,
    pub worklist_label: String,
    executions: Vec<ExecutedTransfer>,
}

impl ExecutedWorklist {
    pub fn for_worklist(worklist: &PlannedWorklist) -> Self {
        Self {
            worklist_index: worklist.index,
            worklist_label: worklist.label.clone(),
            executions: vec![],
        }
    }

    pub fn add_execution(&mut self, execution: ExecutedTransfer) {
        self.executions.push(execution);
    }

    pub fn executions(&self) -> &[ExecutedTransfer] {
        &self.executions
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}
