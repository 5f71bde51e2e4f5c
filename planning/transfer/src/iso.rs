use std::collections::BTreeSet;

use lab::barcode::{RackBarcode, RackMarker};
use lab::pool::PoolId;
use lab::rack_layout::RackLayout;
use thiserror::Error;

use crate::executed::ExecutedWorklist;
use crate::planned::WorklistSeries;

#[derive(
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display
)]
pub enum IsoStatus {
    #[strum(serialize = "queued")]
    Queued,
    #[strum(serialize = "prepared")]
    Prepared,
    #[strum(serialize = "done")]
    Done,
    #[strum(serialize = "cancelled")]
    Cancelled,
}

#[derive(Error, Debug, PartialEq)]
pub enum IsoError {
    #[error("ISO '{label}' cannot move from status '{from}' to '{to}'")]
    InvalidStatusTransition {
        label: String,
        from: IsoStatus,
        to: IsoStatus,
    },
}

/// An in-study order: a work package bundling plates, a pool set, planned
/// worklists and the record of what has already been executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Iso {
    pub label: String,
    pub status: IsoStatus,
    pub number_stock_racks: usize,
    /// Final plate layout in persistence form.
    pub rack_layout: RackLayout,
    pub pool_set: BTreeSet<PoolId>,
    pub worklist_series: WorklistSeries,
    pub executed_worklists: Vec<ExecutedWorklist>,
}

impl Iso {
    pub fn new(label: impl Into<String>, rack_layout: RackLayout, number_stock_racks: usize) -> Self {
        Self {
            label: label.into(),
            status: IsoStatus::Queued,
            number_stock_racks,
            rack_layout,
            pool_set: BTreeSet::new(),
            worklist_series: WorklistSeries::new(),
            executed_worklists: vec![],
        }
    }

    /// Status transitions are gated; executors drive them.
    pub fn transition(&mut self, to: IsoStatus) -> Result<(), IsoError> {
        let allowed = matches!(
            (self.status, to),
            (IsoStatus::Queued, IsoStatus::Prepared)
                | (IsoStatus::Queued, IsoStatus::Done)
                | (IsoStatus::Queued, IsoStatus::Cancelled)
                | (IsoStatus::Prepared, IsoStatus::Done)
                | (IsoStatus::Prepared, IsoStatus::Cancelled)
        );
        if !allowed {
            return Err(IsoError::InvalidStatusTransition {
                label: self.label.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn was_worklist_executed(&self, worklist_label: &str) -> bool {
        self.executed_worklists
            .iter()
            .any(|executed| executed.worklist_label == worklist_label)
    }
}

/// Groups one or more ISOs for processing; job-level preparation steps get
/// their own layout and worklists.
#[derive(Debug, Clone, PartialEq)]
pub struct IsoJob {
    pub label: String,
    pub iso_labels: Vec<String>,
    pub preparation_layout: Option<RackLayout>,
    pub worklist_series: WorklistSeries,
}

/// Binds a physical tube rack to an ISO or ISO job, together with the layout
/// describing its tubes and the stock-transfer worklists drawn from it.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRack {
    pub marker: RackMarker,
    pub rack_barcode: RackBarcode,
    pub rack_layout: RackLayout,
    pub worklist_series: WorklistSeries,
}
