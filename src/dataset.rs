//! Raw input datasets and their JSON loaders.
//!
//! Datasets arrive already fetched; this module only turns parsed JSON
//! documents into [`RawPoint`] and [`RawFeature`] collections. Three layouts
//! are understood:
//!
//! - `points`: a plain array of `{"lat", "lng", "magnitude"?, "type"?}`
//! - `geojson_points`: a FeatureCollection of `Point` features
//! - `geojson_features`: a FeatureCollection of `Polygon`/`MultiPolygon`
//!   features carrying one numeric property

use std::fs;
use std::path::{Path, PathBuf};

use geo::{LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_POINT_MAGNITUDE;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected {expected}")]
    UnexpectedShape { expected: &'static str },

    #[error("record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

fn default_magnitude() -> f64 {
    DEFAULT_POINT_MAGNITUDE
}

/// A located event or point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_magnitude")]
    pub magnitude: f64,
    /// POI type label, e.g. "Cafes".
    #[serde(default, rename = "type")]
    pub category: Option<String>,
}

impl RawPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            magnitude: DEFAULT_POINT_MAGNITUDE,
            category: None,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// An area feature with the attribute it contributes to covered cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Geometry in degrees, `x = lng`, `y = lat`.
    pub geometry: MultiPolygon<f64>,
    pub attribute: f64,
}

impl RawFeature {
    pub fn new(geometry: MultiPolygon<f64>, attribute: f64) -> Self {
        Self { geometry, attribute }
    }
}

/// A raw dataset, already in memory.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Points(Vec<RawPoint>),
    Features(Vec<RawFeature>),
}

/// JSON layout of a dataset document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetFormat {
    Points,
    #[serde(rename = "geojson_points")]
    GeoJsonPoints {
        /// Optional numeric property used as the point magnitude.
        #[serde(default)]
        magnitude_property: Option<String>,
    },
    #[serde(rename = "geojson_features")]
    GeoJsonFeatures {
        /// Numeric property used as the feature attribute.
        property: String,
    },
}

impl Dataset {
    pub fn len(&self) -> usize {
        match self {
            Dataset::Points(points) => points.len(),
            Dataset::Features(features) => features.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the record shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Dataset::Points(_) => "points",
            Dataset::Features(_) => "features",
        }
    }

    /// Keep only points whose category is one of `categories`.
    /// Feature datasets have no categories and are returned unchanged.
    pub fn filter_categories(&self, categories: &[String]) -> Dataset {
        match self {
            Dataset::Points(points) => Dataset::Points(
                points
                    .iter()
                    .filter(|point| {
                        point
                            .category
                            .as_ref()
                            .is_some_and(|category| categories.contains(category))
                    })
                    .cloned()
                    .collect(),
            ),
            Dataset::Features(_) => self.clone(),
        }
    }

    /// Read and parse a dataset file.
    pub fn load<P: AsRef<Path>>(path: P, format: &DatasetFormat) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let json: Value = serde_json::from_str(&json_str)?;
        Self::from_json(&json, format)
    }

    /// Interpret an already-parsed JSON document.
    pub fn from_json(json: &Value, format: &DatasetFormat) -> Result<Dataset, DatasetError> {
        match format {
            DatasetFormat::Points => {
                let points: Vec<RawPoint> = serde_json::from_value(json.clone())?;
                Ok(Dataset::Points(points))
            }
            DatasetFormat::GeoJsonPoints { magnitude_property } => {
                let points = feature_array(json)?
                    .iter()
                    .enumerate()
                    .map(|(index, feature)| {
                        parse_point_feature(feature, magnitude_property.as_deref())
                            .map_err(|reason| DatasetError::InvalidRecord { index, reason })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Dataset::Points(points))
            }
            DatasetFormat::GeoJsonFeatures { property } => {
                let features = feature_array(json)?
                    .iter()
                    .enumerate()
                    .map(|(index, feature)| {
                        parse_area_feature(feature, property)
                            .map_err(|reason| DatasetError::InvalidRecord { index, reason })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Dataset::Features(features))
            }
        }
    }
}

fn feature_array(json: &Value) -> Result<&Vec<Value>, DatasetError> {
    json.get("features")
        .and_then(Value::as_array)
        .ok_or(DatasetError::UnexpectedShape {
            expected: "a GeoJSON FeatureCollection with a \"features\" array",
        })
}

fn geometry_of<'a>(feature: &'a Value, expected: &[&str]) -> Result<(&'a str, &'a Value), String> {
    let geometry = feature.get("geometry").filter(|g| !g.is_null()).ok_or("missing geometry")?;
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry has no type")?;
    if !expected.contains(&kind) {
        return Err(format!("unsupported geometry type {kind}"));
    }
    let coordinates = geometry.get("coordinates").ok_or("geometry has no coordinates")?;
    Ok((kind, coordinates))
}

fn numeric_property(feature: &Value, property: &str) -> Result<f64, String> {
    feature
        .get("properties")
        .and_then(|props| props.get(property))
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("missing numeric property \"{property}\""))
}

/// GeoJSON position `[lng, lat, ...]` as `(x, y)`.
fn position(value: &Value) -> Result<(f64, f64), String> {
    match value.as_array().map(Vec::as_slice) {
        Some([lng, lat, ..]) => match (lng.as_f64(), lat.as_f64()) {
            (Some(lng), Some(lat)) => Ok((lng, lat)),
            _ => Err("position is not numeric".to_string()),
        },
        _ => Err("position needs at least [lng, lat]".to_string()),
    }
}

fn parse_point_feature(feature: &Value, magnitude_property: Option<&str>) -> Result<RawPoint, String> {
    let (_, coordinates) = geometry_of(feature, &["Point"])?;
    let (lng, lat) = position(coordinates)?;

    let mut point = RawPoint::new(lat, lng);
    if let Some(property) = magnitude_property {
        point.magnitude = numeric_property(feature, property)?;
    }
    Ok(point)
}

fn ring(value: &Value) -> Result<LineString<f64>, String> {
    let positions = value.as_array().ok_or("ring is not an array")?;
    let coords = positions.iter().map(position).collect::<Result<Vec<_>, _>>()?;
    if coords.len() < 4 {
        return Err("ring needs at least four positions".to_string());
    }
    Ok(LineString::from(coords))
}

fn polygon(value: &Value) -> Result<Polygon<f64>, String> {
    let rings = value.as_array().ok_or("polygon is not an array of rings")?;
    let (exterior, holes) = rings.split_first().ok_or("polygon has no rings")?;
    let holes = holes.iter().map(ring).collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(ring(exterior)?, holes))
}

fn parse_area_feature(feature: &Value, property: &str) -> Result<RawFeature, String> {
    let (kind, coordinates) = geometry_of(feature, &["Polygon", "MultiPolygon"])?;
    let geometry = if kind == "Polygon" {
        MultiPolygon::new(vec![polygon(coordinates)?])
    } else {
        let parts = coordinates.as_array().ok_or("multipolygon is not an array")?;
        MultiPolygon::new(parts.iter().map(polygon).collect::<Result<Vec<_>, _>>()?)
    };

    Ok(RawFeature::new(geometry, numeric_property(feature, property)?))
}
