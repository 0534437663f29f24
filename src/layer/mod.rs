/// Hexagon layer: one score per H3 cell at a single resolution.
///
/// Layers only contain cells that were actually observed; an empty layer
/// means "no data" and flows through normalization and combination as-is.

pub mod serialize_cell_values;

use std::collections::HashMap;

use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SuitabilityError};
use serialize_cell_values::{
    deserialize_cell_values, deserialize_resolution, serialize_cell_values, serialize_resolution,
};

/// Invariants: every cell sits at `resolution` and every score is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayerRecord")]
pub struct Layer {
    #[serde(serialize_with = "serialize_resolution")]
    resolution: Resolution,

    /// Set once the values have been rescaled into [0,1].
    normalized: bool,

    #[serde(serialize_with = "serialize_cell_values")]
    cells: HashMap<CellIndex, f64>,
}

/// Wire shape of a layer, checked before it becomes a [`Layer`].
#[derive(Deserialize)]
struct LayerRecord {
    #[serde(deserialize_with = "deserialize_resolution")]
    resolution: Resolution,
    #[serde(default)]
    normalized: bool,
    #[serde(deserialize_with = "deserialize_cell_values")]
    cells: HashMap<CellIndex, f64>,
}

impl TryFrom<LayerRecord> for Layer {
    type Error = SuitabilityError;

    fn try_from(record: LayerRecord) -> Result<Self> {
        check_cells(record.resolution, &record.cells)?;
        Ok(Self {
            resolution: record.resolution,
            normalized: record.normalized,
            cells: record.cells,
        })
    }
}

fn check_cells(resolution: Resolution, cells: &HashMap<CellIndex, f64>) -> Result<()> {
    for (&cell, &value) in cells {
        if cell.resolution() != resolution {
            return Err(SuitabilityError::CellResolutionMismatch {
                cell,
                expected: resolution,
                found: cell.resolution(),
            });
        }
        if !value.is_finite() {
            return Err(SuitabilityError::NonFiniteScore { cell, value });
        }
    }
    Ok(())
}

impl Layer {
    /// Empty, un-normalized layer.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            normalized: false,
            cells: HashMap::new(),
        }
    }

    /// Wrap raw accumulated scores, rejecting cells at another resolution
    /// and non-finite scores.
    pub fn from_cells(resolution: Resolution, cells: HashMap<CellIndex, f64>) -> Result<Self> {
        check_cells(resolution, &cells)?;
        Ok(Self {
            resolution,
            normalized: false,
            cells,
        })
    }

    pub(crate) fn from_normalized(resolution: Resolution, cells: HashMap<CellIndex, f64>) -> Self {
        Self {
            resolution,
            normalized: true,
            cells,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, cell: CellIndex) -> Option<f64> {
        self.cells.get(&cell).copied()
    }

    /// Score for `cell`, treating unobserved cells as 0.
    pub fn value_or_zero(&self, cell: CellIndex) -> f64 {
        self.get(cell).unwrap_or(0.0)
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        self.cells.contains_key(&cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellIndex, f64)> + '_ {
        self.cells.iter().map(|(cell, value)| (*cell, *value))
    }

    pub fn cells(&self) -> &HashMap<CellIndex, f64> {
        &self.cells
    }

    pub fn into_cells(self) -> HashMap<CellIndex, f64> {
        self.cells
    }

    pub fn max_value(&self) -> Option<f64> {
        self.cells.values().copied().reduce(f64::max)
    }

    pub fn min_value(&self) -> Option<f64> {
        self.cells.values().copied().reduce(f64::min)
    }

    /// Cells scoring strictly above `threshold`, sorted by cell index.
    pub fn cells_above(&self, threshold: f64) -> Vec<CellIndex> {
        let mut cells: Vec<CellIndex> = self
            .iter()
            .filter(|&(_, value)| value > threshold)
            .map(|(cell, _)| cell)
            .collect();
        cells.sort_unstable();
        cells
    }

    /// The `count` best cells, highest score first; ties break on cell index.
    pub fn top_cells(&self, count: usize) -> Vec<(CellIndex, f64)> {
        let mut ranked: Vec<(CellIndex, f64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(count);
        ranked
    }
}
