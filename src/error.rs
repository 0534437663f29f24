//! Error types for layer construction, combination and analysis runs.
//!
//! Every variant carries enough context (dataset name, record index,
//! resolution) to diagnose the failing input without a debugger.

use h3o::{CellIndex, Resolution};

use crate::hex_grid::GridError;

/// Errors surfaced synchronously by the suitability engine.
#[derive(Debug, thiserror::Error)]
pub enum SuitabilityError {
    /// A layer was built at a different resolution than the run.
    #[error("layer '{layer}' was built at resolution {found}, expected {expected}")]
    ResolutionMismatch {
        layer: String,
        expected: Resolution,
        found: Resolution,
    },

    /// A cell inside a layer sits at a different resolution than the layer.
    #[error("cell {cell} is at resolution {found}, layer is at {expected}")]
    CellResolutionMismatch {
        cell: CellIndex,
        expected: Resolution,
        found: Resolution,
    },

    /// A cell score was NaN or infinite.
    #[error("cell {cell} has non-finite score {value}")]
    NonFiniteScore { cell: CellIndex, value: f64 },

    /// The accumulation policy does not apply to the dataset's shape.
    #[error("dataset '{dataset}': policy '{policy}' cannot accumulate {shape}")]
    PolicyMismatch {
        dataset: String,
        policy: &'static str,
        shape: &'static str,
    },

    /// A cost attribute was zero, negative or not finite.
    #[error("dataset '{dataset}': feature {index} has invalid cost {value} (must be finite and > 0)")]
    InvalidCost {
        dataset: String,
        index: usize,
        value: f64,
    },

    /// A point magnitude or feature value was not finite.
    #[error("dataset '{dataset}': record {index} has non-finite value {value}")]
    NonFiniteValue {
        dataset: String,
        index: usize,
        value: f64,
    },

    /// A neighbor ring weight or buffer distance was not usable.
    #[error("dataset '{dataset}': invalid policy parameter {name} = {value}")]
    InvalidPolicyParameter {
        dataset: String,
        name: &'static str,
        value: f64,
    },

    /// A layer weight was NaN or infinite.
    #[error("layer '{layer}' has non-finite weight {weight}")]
    NonFiniteWeight { layer: String, weight: f64 },

    /// The grid could not index a record of a dataset.
    #[error("dataset '{dataset}': record {index}: {source}")]
    Grid {
        dataset: String,
        index: usize,
        #[source]
        source: GridError,
    },
}

pub type Result<T> = std::result::Result<T, SuitabilityError>;
