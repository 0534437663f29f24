//! Layer construction from raw datasets.
//!
//! Each build owns a local accumulator and hands back a finished [`Layer`];
//! nothing is shared between builds, so datasets can be built in any order
//! or in parallel. Contributions are summed, so record order never changes
//! the result.

use std::collections::HashMap;

use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{DEFAULT_NEIGHBOR_RING_WEIGHT, MAX_BUFFER_RINGS};
use crate::dataset::{Dataset, RawFeature, RawPoint};
use crate::error::{Result, SuitabilityError};
use crate::hex_grid::{DistanceUnit, HexGridIndex};
use crate::layer::Layer;

fn default_ring_weight() -> f64 {
    DEFAULT_NEIGHBOR_RING_WEIGHT
}

fn default_unit() -> DistanceUnit {
    DistanceUnit::Kilometers
}

/// How a dataset's records turn into cell scores. Chosen per dataset when
/// the analysis is configured, never guessed from the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccumulationPolicy {
    /// Each point adds its magnitude to its own cell.
    PointCount,
    /// Like `PointCount`, plus `ring_weight` to each cell of the 1-ring.
    NeighborFalloff {
        #[serde(default = "default_ring_weight")]
        ring_weight: f64,
    },
    /// Linear decay `1 - d/(R+1)` over rings `0..=R` around each point.
    DistanceBuffered { radius: BufferRadius },
    /// Each feature adds a value derived from its attribute to every covered cell.
    FeatureCovering {
        #[serde(default)]
        attribute: FeatureAttribute,
    },
}

impl AccumulationPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            AccumulationPolicy::PointCount => "point_count",
            AccumulationPolicy::NeighborFalloff { .. } => "neighbor_falloff",
            AccumulationPolicy::DistanceBuffered { .. } => "distance_buffered",
            AccumulationPolicy::FeatureCovering { .. } => "feature_covering",
        }
    }
}

/// Buffer radius, either in ring steps or as a ground distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferRadius {
    Rings(u32),
    Distance {
        value: f64,
        #[serde(default = "default_unit")]
        unit: DistanceUnit,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureAttribute {
    /// Lower is better (e.g. travel time); cells receive `1 / cost`.
    #[default]
    Cost,
    /// Higher is better; cells receive the value as-is.
    Value,
}

/// Ring count whose hexagon edges fit inside `distance`.
pub fn radius_for_distance<G: HexGridIndex>(
    grid: &G,
    resolution: Resolution,
    distance: f64,
    unit: DistanceUnit,
) -> Option<u32> {
    if !distance.is_finite() || distance < 0.0 {
        return None;
    }
    let rings = (distance / grid.edge_length(resolution, unit)).floor();
    Some(rings.min(u32::MAX as f64) as u32)
}

/// Builds raw (un-normalized) layers at one resolution.
pub struct LayerBuilder<'g, G: HexGridIndex> {
    grid: &'g G,
    resolution: Resolution,
}

impl<'g, G: HexGridIndex> LayerBuilder<'g, G> {
    pub fn new(grid: &'g G, resolution: Resolution) -> Self {
        Self { grid, resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Build `dataset` with `policy`, rejecting policies that do not fit
    /// the dataset's record shape.
    pub fn build(&self, name: &str, dataset: &Dataset, policy: &AccumulationPolicy) -> Result<Layer> {
        let layer = match (policy, dataset) {
            (AccumulationPolicy::PointCount, Dataset::Points(points)) => self.point_count(name, points)?,
            (AccumulationPolicy::NeighborFalloff { ring_weight }, Dataset::Points(points)) => {
                self.neighbor_falloff(name, points, *ring_weight)?
            }
            (AccumulationPolicy::DistanceBuffered { radius }, Dataset::Points(points)) => {
                let rings = self.rings_for(name, radius)?;
                self.distance_buffered(name, points, rings)?
            }
            (AccumulationPolicy::FeatureCovering { attribute }, Dataset::Features(features)) => {
                self.feature_covering(name, features, *attribute)?
            }
            (policy, dataset) => {
                return Err(SuitabilityError::PolicyMismatch {
                    dataset: name.to_string(),
                    policy: policy.name(),
                    shape: dataset.shape(),
                });
            }
        };

        debug!(
            dataset = name,
            policy = policy.name(),
            records = dataset.len(),
            cells = layer.len(),
            resolution = %self.resolution,
            "built layer"
        );
        Ok(layer)
    }

    /// Ring count for a configured buffer radius, at most [`MAX_BUFFER_RINGS`].
    pub fn rings_for(&self, name: &str, radius: &BufferRadius) -> Result<u32> {
        match *radius {
            BufferRadius::Rings(rings) if rings <= MAX_BUFFER_RINGS => Ok(rings),
            BufferRadius::Rings(rings) => Err(SuitabilityError::InvalidPolicyParameter {
                dataset: name.to_string(),
                name: "buffer rings",
                value: f64::from(rings),
            }),
            BufferRadius::Distance { value, unit } => radius_for_distance(self.grid, self.resolution, value, unit)
                .filter(|rings| *rings <= MAX_BUFFER_RINGS)
                .ok_or_else(|| SuitabilityError::InvalidPolicyParameter {
                    dataset: name.to_string(),
                    name: "buffer distance",
                    value,
                }),
        }
    }

    pub fn point_count(&self, name: &str, points: &[RawPoint]) -> Result<Layer> {
        let mut acc = HashMap::new();
        for (index, point) in points.iter().enumerate() {
            let cell = self.point_cell(name, index, point)?;
            *acc.entry(cell).or_insert(0.0) += point.magnitude;
        }
        Layer::from_cells(self.resolution, acc)
    }

    pub fn neighbor_falloff(&self, name: &str, points: &[RawPoint], ring_weight: f64) -> Result<Layer> {
        if !ring_weight.is_finite() {
            return Err(SuitabilityError::InvalidPolicyParameter {
                dataset: name.to_string(),
                name: "ring_weight",
                value: ring_weight,
            });
        }

        let mut acc = HashMap::new();
        for (index, point) in points.iter().enumerate() {
            let cell = self.point_cell(name, index, point)?;
            *acc.entry(cell).or_insert(0.0) += point.magnitude;
            for neighbor in self.grid.ring_at(cell, 1) {
                *acc.entry(neighbor).or_insert(0.0) += ring_weight;
            }
        }
        Layer::from_cells(self.resolution, acc)
    }

    pub fn distance_buffered(&self, name: &str, points: &[RawPoint], radius: u32) -> Result<Layer> {
        if radius > MAX_BUFFER_RINGS {
            return Err(SuitabilityError::InvalidPolicyParameter {
                dataset: name.to_string(),
                name: "buffer rings",
                value: f64::from(radius),
            });
        }
        let steps = f64::from(radius) + 1.0;

        let mut acc = HashMap::new();
        for (index, point) in points.iter().enumerate() {
            let cell = self.point_cell(name, index, point)?;
            for (distance, ring) in self.grid.rings_up_to(cell, radius) {
                let weight = 1.0 - f64::from(distance) / steps;
                for neighbor in ring {
                    *acc.entry(neighbor).or_insert(0.0) += weight;
                }
            }
        }
        Layer::from_cells(self.resolution, acc)
    }

    pub fn feature_covering(
        &self,
        name: &str,
        features: &[RawFeature],
        attribute: FeatureAttribute,
    ) -> Result<Layer> {
        let mut acc = HashMap::new();
        for (index, feature) in features.iter().enumerate() {
            let value = feature_value(name, index, feature.attribute, attribute)?;
            let cells = self
                .grid
                .covering_cells(feature, self.resolution)
                .map_err(|source| SuitabilityError::Grid {
                    dataset: name.to_string(),
                    index,
                    source,
                })?;
            for cell in cells {
                *acc.entry(cell).or_insert(0.0) += value;
            }
        }
        Layer::from_cells(self.resolution, acc)
    }

    fn point_cell(&self, name: &str, index: usize, point: &RawPoint) -> Result<CellIndex> {
        if !point.magnitude.is_finite() {
            return Err(SuitabilityError::NonFiniteValue {
                dataset: name.to_string(),
                index,
                value: point.magnitude,
            });
        }
        self.grid
            .cell_at(point.lat, point.lng, self.resolution)
            .map_err(|source| SuitabilityError::Grid {
                dataset: name.to_string(),
                index,
                source,
            })
    }
}

fn feature_value(name: &str, index: usize, raw: f64, attribute: FeatureAttribute) -> Result<f64> {
    match attribute {
        FeatureAttribute::Cost if raw.is_finite() && raw > 0.0 => Ok(1.0 / raw),
        FeatureAttribute::Cost => Err(SuitabilityError::InvalidCost {
            dataset: name.to_string(),
            index,
            value: raw,
        }),
        FeatureAttribute::Value if raw.is_finite() => Ok(raw),
        FeatureAttribute::Value => Err(SuitabilityError::NonFiniteValue {
            dataset: name.to_string(),
            index,
            value: raw,
        }),
    }
}
