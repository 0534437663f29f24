/// Weighted combination of normalized layers into one composite
///
/// Every layer's cells contribute `value * weight`; a cell missing from a
/// layer contributes nothing from it. Negative weights mark detractor
/// layers (crime, noise) that pull a cell's score down.

use std::collections::HashMap;

use h3o::Resolution;
use tracing::debug;

use crate::error::{Result, SuitabilityError};
use crate::layer::Layer;
use crate::normalize::{NormalizeMode, normalize};

/// A named layer and the weight it carries in the composite.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedLayer {
    pub name: String,
    pub layer: Layer,
    pub weight: f64,
}

impl WeightedLayer {
    pub fn new(name: impl Into<String>, layer: Layer, weight: f64) -> Self {
        Self {
            name: name.into(),
            layer,
            weight,
        }
    }

    pub fn is_detractor(&self) -> bool {
        self.weight < 0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LayerCombiner {
    resolution: Resolution,
    mode: NormalizeMode,
}

impl LayerCombiner {
    /// Combiner for layers at `resolution`, normalizing with zero-floor.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            mode: NormalizeMode::ZeroFloor,
        }
    }

    pub fn with_mode(mut self, mode: NormalizeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn mode(&self) -> NormalizeMode {
        self.mode
    }

    /// Sum of `weight * value` per cell, before normalization.
    pub fn combine_raw(&self, layers: &[WeightedLayer]) -> Result<Layer> {
        for weighted in layers {
            self.validate(weighted)?;
        }

        let mut acc: HashMap<_, f64> = HashMap::new();
        for weighted in layers {
            for (cell, value) in weighted.layer.iter() {
                *acc.entry(cell).or_insert(0.0) += value * weighted.weight;
            }
        }

        debug!(
            layers = layers.len(),
            cells = acc.len(),
            resolution = %self.resolution,
            "combined layers"
        );
        Layer::from_cells(self.resolution, acc)
    }

    /// Weighted sum normalized into [0,1].
    pub fn combine(&self, layers: &[WeightedLayer]) -> Result<Layer> {
        Ok(normalize(self.combine_raw(layers)?, self.mode))
    }

    fn validate(&self, weighted: &WeightedLayer) -> Result<()> {
        if weighted.layer.resolution() != self.resolution {
            return Err(SuitabilityError::ResolutionMismatch {
                layer: weighted.name.clone(),
                expected: self.resolution,
                found: weighted.layer.resolution(),
            });
        }
        if !weighted.weight.is_finite() {
            return Err(SuitabilityError::NonFiniteWeight {
                layer: weighted.name.clone(),
                weight: weighted.weight,
            });
        }
        Ok(())
    }
}
