/// Hexagonal grid indexing
///
/// The engine only talks to the grid through [`HexGridIndex`], so layer
/// construction can be exercised against any H3-compatible index.
/// [`H3Grid`] is the production adapter backed by `h3o`.

use std::collections::HashSet;

use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, LatLng, Resolution};

use crate::dataset::RawFeature;

/// Errors raised by the grid while indexing raw records.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("coordinate ({lat}, {lng}) is not a valid latitude/longitude")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("feature geometry cannot be tiled: {0}")]
    InvalidGeometry(#[from] h3o::error::InvalidGeometry),
}

/// Length unit for [`HexGridIndex::edge_length`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    Kilometers,
    Meters,
}

/// Grid capability consumed by the layer builders.
pub trait HexGridIndex {
    /// Cell containing the point at the given resolution.
    fn cell_at(&self, lat: f64, lng: f64, resolution: Resolution) -> Result<CellIndex, GridError>;

    /// Cells exactly `distance` steps from `cell`; distance 0 yields `[cell]`.
    fn ring_at(&self, cell: CellIndex, distance: u32) -> Vec<CellIndex>;

    /// Rings at distance `0..=max_distance`, in distance order.
    fn rings_up_to(&self, cell: CellIndex, max_distance: u32) -> Vec<(u32, Vec<CellIndex>)>;

    /// Cells whose centroid lies inside the feature's geometry.
    fn covering_cells(
        &self,
        feature: &RawFeature,
        resolution: Resolution,
    ) -> Result<Vec<CellIndex>, GridError>;

    /// Average hexagon edge length at the resolution.
    fn edge_length(&self, resolution: Resolution, unit: DistanceUnit) -> f64;
}

/// `h3o`-backed grid index.
#[derive(Debug, Clone, Copy, Default)]
pub struct H3Grid;

impl H3Grid {
    pub fn new() -> Self {
        H3Grid
    }
}

impl HexGridIndex for H3Grid {
    fn cell_at(&self, lat: f64, lng: f64, resolution: Resolution) -> Result<CellIndex, GridError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(GridError::InvalidCoordinate { lat, lng });
        }
        let latlng = LatLng::new(lat, lng).map_err(|_| GridError::InvalidCoordinate { lat, lng })?;
        Ok(latlng.to_cell(resolution))
    }

    fn ring_at(&self, cell: CellIndex, distance: u32) -> Vec<CellIndex> {
        cell.grid_disk_distances::<Vec<_>>(distance)
            .into_iter()
            .filter(|&(_, d)| d == distance)
            .map(|(neighbor, _)| neighbor)
            .collect()
    }

    fn rings_up_to(&self, cell: CellIndex, max_distance: u32) -> Vec<(u32, Vec<CellIndex>)> {
        let mut rings: Vec<(u32, Vec<CellIndex>)> =
            (0..=max_distance).map(|d| (d, Vec::new())).collect();

        for (neighbor, d) in cell.grid_disk_distances::<Vec<_>>(max_distance) {
            rings[d as usize].1.push(neighbor);
        }

        rings
    }

    fn covering_cells(
        &self,
        feature: &RawFeature,
        resolution: Resolution,
    ) -> Result<Vec<CellIndex>, GridError> {
        let mut tiler = TilerBuilder::new(resolution)
            .containment_mode(ContainmentMode::ContainsCentroid)
            .build();

        for polygon in feature.geometry.iter() {
            tiler.add(polygon.clone())?;
        }

        // A cell shared by two parts of a multipolygon still counts once.
        let unique: HashSet<CellIndex> = tiler.into_coverage().collect();
        let mut cells: Vec<CellIndex> = unique.into_iter().collect();
        cells.sort_unstable();
        Ok(cells)
    }

    fn edge_length(&self, resolution: Resolution, unit: DistanceUnit) -> f64 {
        match unit {
            DistanceUnit::Kilometers => resolution.edge_length_km(),
            DistanceUnit::Meters => resolution.edge_length_m(),
        }
    }
}
