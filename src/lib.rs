pub mod analysis;
pub mod builder;
pub mod combine;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod hex_grid;
pub mod layer;
pub mod normalize;

pub use analysis::{AnalysisConfig, AnalysisError, AnalysisOutput, SourceConfig, run_analysis};
pub use builder::{AccumulationPolicy, BufferRadius, FeatureAttribute, LayerBuilder};
pub use combine::{LayerCombiner, WeightedLayer};
pub use dataset::{Dataset, DatasetFormat, RawFeature, RawPoint};
pub use error::SuitabilityError;
pub use hex_grid::{DistanceUnit, H3Grid, HexGridIndex};
pub use layer::Layer;
pub use normalize::{NormalizeMode, normalize};
