//! Config-driven suitability runs.
//!
//! An [`AnalysisConfig`] names every source layer with its accumulation
//! policy, normalization mode and weight. [`run_analysis`] builds each
//! source layer, normalizes it exactly once, folds the weighted layers into
//! a composite and marks the cells that clear the area threshold.
//!
//! Runs are cheap and stateless: a weight or resolution change is handled
//! by running again.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::builder::{AccumulationPolicy, LayerBuilder};
use crate::combine::{LayerCombiner, WeightedLayer};
use crate::constants::{
    DEFAULT_AREA_THRESHOLD, DEFAULT_RESOLUTION, MAX_ANALYSIS_RESOLUTION, MIN_ANALYSIS_RESOLUTION,
};
use crate::dataset::{Dataset, DatasetFormat};
use crate::error::SuitabilityError;
use crate::hex_grid::HexGridIndex;
use crate::layer::Layer;
use crate::layer::serialize_cell_values::serialize_cell_list;
use crate::normalize::{NormalizeMode, normalize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resolution {0} is outside the supported range {min}..={max}", min = u8::from(MIN_ANALYSIS_RESOLUTION), max = u8::from(MAX_ANALYSIS_RESOLUTION))]
    UnsupportedResolution(u8),

    #[error("source '{0}' is configured more than once")]
    DuplicateSource(String),

    #[error("no source named '{0}'")]
    UnknownSource(String),

    #[error("no dataset supplied for source '{0}'")]
    MissingDataset(String),

    #[error("area threshold {0} must lie in [0, 1]")]
    InvalidAreaThreshold(f64),

    #[error("source '{name}' is a detractor; its weight {weight} must be a non-negative magnitude")]
    NegativeDetractorWeight { name: String, weight: f64 },
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layer(#[from] SuitabilityError),
}

fn default_resolution() -> u8 {
    u8::from(DEFAULT_RESOLUTION)
}

fn default_area_threshold() -> f64 {
    DEFAULT_AREA_THRESHOLD
}

fn default_weight() -> f64 {
    1.0
}

/// One named input layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    /// Dataset file, resolved by the caller (relative to a data directory).
    #[serde(default)]
    pub path: Option<PathBuf>,

    pub format: DatasetFormat,

    pub policy: AccumulationPolicy,

    /// Magnitude of the layer's influence; 0 disables it.
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Subtract instead of add (crime, noise).
    #[serde(default)]
    pub detractor: bool,

    #[serde(default)]
    pub normalization: NormalizeMode,

    /// Keep only points of these categories.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

impl SourceConfig {
    /// Weight with polarity applied.
    pub fn signed_weight(&self) -> f64 {
        if self.detractor { -self.weight } else { self.weight }
    }

    /// A detractor's weight is a magnitude; a negative one would flip it back.
    fn check_weight(&self) -> Result<(), ConfigError> {
        if self.detractor && self.weight < 0.0 {
            return Err(ConfigError::NegativeDetractorWeight {
                name: self.name.clone(),
                weight: self.weight,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_resolution")]
    pub resolution: u8,

    #[serde(default)]
    pub composite_normalization: NormalizeMode,

    #[serde(default = "default_area_threshold")]
    pub area_threshold: f64,

    pub sources: Vec<SourceConfig>,
}

impl AnalysisConfig {
    pub fn from_json_str(json_str: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json_str)
    }

    /// Grid resolution, restricted to the analysis range.
    pub fn grid_resolution(&self) -> Result<Resolution, ConfigError> {
        let supported = u8::from(MIN_ANALYSIS_RESOLUTION)..=u8::from(MAX_ANALYSIS_RESOLUTION);
        if !supported.contains(&self.resolution) {
            return Err(ConfigError::UnsupportedResolution(self.resolution));
        }
        Resolution::try_from(self.resolution).map_err(|_| ConfigError::UnsupportedResolution(self.resolution))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid_resolution()?;

        if !(0.0..=1.0).contains(&self.area_threshold) {
            return Err(ConfigError::InvalidAreaThreshold(self.area_threshold));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource(source.name.clone()));
            }
            source.check_weight()?;
        }
        Ok(())
    }

    /// Override one source's weight magnitude, keeping its polarity.
    pub fn set_weight(&mut self, name: &str, weight: f64) -> Result<(), ConfigError> {
        let source = self
            .sources
            .iter_mut()
            .find(|source| source.name == name)
            .ok_or_else(|| ConfigError::UnknownSource(name.to_string()))?;
        let previous = std::mem::replace(&mut source.weight, weight);
        if let Err(err) = source.check_weight() {
            source.weight = previous;
            return Err(err);
        }
        Ok(())
    }
}

/// Result of one run, handed to the rendering side.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    /// Final [0,1] score per cell.
    pub composite: Layer,
    /// Each source's normalized layer, for inspection.
    pub layers: BTreeMap<String, Layer>,
    /// Composite cells scoring above the area threshold.
    #[serde(serialize_with = "serialize_cell_list")]
    pub suitable_cells: Vec<CellIndex>,
}

/// Build, normalize, weight and combine every configured source.
pub fn run_analysis<G: HexGridIndex>(
    grid: &G,
    config: &AnalysisConfig,
    datasets: &HashMap<String, Dataset>,
) -> Result<AnalysisOutput, AnalysisError> {
    config.validate()?;
    let resolution = config.grid_resolution()?;
    let builder = LayerBuilder::new(grid, resolution);

    let mut weighted = Vec::with_capacity(config.sources.len());
    let mut layers = BTreeMap::new();

    for source in &config.sources {
        let dataset = datasets
            .get(&source.name)
            .ok_or_else(|| ConfigError::MissingDataset(source.name.clone()))?;

        let filtered;
        let dataset = match &source.categories {
            Some(categories) => {
                filtered = dataset.filter_categories(categories);
                &filtered
            }
            None => dataset,
        };

        let layer = normalize(
            builder.build(&source.name, dataset, &source.policy)?,
            source.normalization,
        );

        if source.weight == 0.0 {
            warn!(source = %source.name, "source has zero weight and will not affect the composite");
        }

        layers.insert(source.name.clone(), layer.clone());
        weighted.push(WeightedLayer::new(source.name.clone(), layer, source.signed_weight()));
    }

    let composite = LayerCombiner::new(resolution)
        .with_mode(config.composite_normalization)
        .combine(&weighted)?;
    let suitable_cells = composite.cells_above(config.area_threshold);

    info!(
        sources = config.sources.len(),
        cells = composite.len(),
        suitable = suitable_cells.len(),
        resolution = %resolution,
        "suitability analysis complete"
    );

    Ok(AnalysisOutput {
        composite,
        layers,
        suitable_cells,
    })
}
