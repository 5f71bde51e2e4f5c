use std::collections::BTreeMap;

use thiserror::Error;

use crate::barcode::{RackBarcode, TubeBarcode};
use crate::container::{Container, ContainerKind, Sample};
use crate::geometry::{RackPosition, RackShape};

/// A physical plate (fixed wells) or tube rack (movable tubes).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct Rack {
    pub barcode: RackBarcode,
    pub label: String,
    pub kind: RackKind,
    pub shape: RackShape,
    containers: BTreeMap<RackPosition, Container>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RackKind {
    Plate,
    TubeRack,
}

#[derive(Error, Debug, PartialEq)]
pub enum RackError {
    #[error("Position '{position}' is outside the {shape} rack shape")]
    PositionOutOfShape { position: RackPosition, shape: RackShape },

    #[error("Position '{0}' already holds a tube")]
    PositionOccupied(RackPosition),

    #[error("No tube at position '{0}'")]
    NoTubeAtPosition(RackPosition),

    #[error("Rack '{0}' is a plate; tubes can only be moved on tube racks")]
    NotATubeRack(RackBarcode),
}

impl Rack {
    /// A plate has a well at every position of its shape.
    pub fn plate(barcode: RackBarcode, label: impl Into<String>, shape: RackShape) -> Self {
        let containers = shape
            .positions()
            .map(|position| (position, Container::well()))
            .collect();
        Self {
            barcode,
            label: label.into(),
            kind: RackKind::Plate,
            shape,
            containers,
        }
    }

    /// A tube rack starts empty; tubes are added and removed individually.
    pub fn tube_rack(barcode: RackBarcode, label: impl Into<String>, shape: RackShape) -> Self {
        Self {
            barcode,
            label: label.into(),
            kind: RackKind::TubeRack,
            shape,
            containers: BTreeMap::new(),
        }
    }

    pub fn add_tube(&mut self, position: RackPosition, tube_barcode: TubeBarcode) -> Result<(), RackError> {
        if self.kind != RackKind::TubeRack {
            return Err(RackError::NotATubeRack(self.barcode.clone()));
        }
        if !self.shape.contains_position(position) {
            return Err(RackError::PositionOutOfShape {
                position,
                shape: self.shape,
            });
        }
        if self.containers.contains_key(&position) {
            return Err(RackError::PositionOccupied(position));
        }
        self.containers
            .insert(position, Container::tube(tube_barcode));
        Ok(())
    }

    pub fn remove_tube(&mut self, position: RackPosition) -> Result<Container, RackError> {
        if self.kind != RackKind::TubeRack {
            return Err(RackError::NotATubeRack(self.barcode.clone()));
        }
        self.containers
            .remove(&position)
            .ok_or(RackError::NoTubeAtPosition(position))
    }

    pub fn container(&self, position: RackPosition) -> Option<&Container> {
        self.containers.get(&position)
    }

    pub fn container_mut(&mut self, position: RackPosition) -> Option<&mut Container> {
        self.containers.get_mut(&position)
    }

    pub fn sample(&self, position: RackPosition) -> Option<&Sample> {
        self.containers
            .get(&position)
            .and_then(|container| container.sample.as_ref())
    }

    /// Containers in row-major position order.
    pub fn containers(&self) -> impl Iterator<Item = (&RackPosition, &Container)> {
        self.containers.iter()
    }

    /// Positions of tubes present on the rack, with their barcodes, row-major.
    pub fn tubes(&self) -> impl Iterator<Item = (RackPosition, &TubeBarcode)> {
        self.containers
            .iter()
            .filter_map(|(position, container)| match &container.kind {
                ContainerKind::Tube(barcode) => Some((*position, barcode)),
                ContainerKind::Well => None,
            })
    }

    /// A rack counts as empty when it has no tubes and no samples.
    pub fn is_empty(&self) -> bool {
        self.containers
            .values()
            .all(|container| container.tube_barcode().is_none() && !container.has_sample())
    }

    pub fn positions_with_samples(&self) -> impl Iterator<Item = (RackPosition, &Sample)> {
        self.containers
            .iter()
            .filter_map(|(position, container)| {
                container
                    .sample
                    .as_ref()
                    .map(|sample| (*position, sample))
            })
    }
}
