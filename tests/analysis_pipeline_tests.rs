// End-to-end runs over a small Oakland-style scenario: crime reports,
// schools, transit stations, tract travel times and cafes.

use std::collections::HashMap;

use h3o::Resolution;
use hex_suitability::analysis::{AnalysisError, ConfigError};
use hex_suitability::{
    AnalysisConfig, Dataset, DatasetFormat, H3Grid, HexGridIndex, NormalizeMode, SuitabilityError, run_analysis,
};
use more_asserts::{assert_ge, assert_gt, assert_le};
use serde_json::{Value, json};

const STATION: (f64, f64) = (37.803664, -122.271604);

fn config() -> Value {
    json!({
        "resolution": 9,
        "area_threshold": 0.75,
        "sources": [
            {
                "name": "crime",
                "format": {"kind": "points"},
                "policy": {"kind": "point_count"},
                "detractor": true
            },
            {
                "name": "schools",
                "format": {"kind": "points"},
                "policy": {"kind": "neighbor_falloff", "ring_weight": 0.5}
            },
            {
                "name": "bart",
                "format": {"kind": "geojson_points"},
                "policy": {"kind": "distance_buffered", "radius": {"distance": {"value": 1.0}}}
            },
            {
                "name": "travel",
                "format": {"kind": "geojson_features", "property": "travelTime"},
                "policy": {"kind": "feature_covering", "attribute": "cost"},
                "normalization": "min_floor"
            },
            {
                "name": "cafes",
                "format": {"kind": "points"},
                "policy": {"kind": "point_count"},
                "categories": ["Cafes", "Places to Eat", "Restaurant"]
            }
        ]
    })
}

fn tract(lng: f64, lat: f64, travel_time: f64) -> Value {
    let h = 0.006;
    json!({
        "type": "Feature",
        "properties": {"travelTime": travel_time},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lng - h, lat - h], [lng + h, lat - h], [lng + h, lat + h], [lng - h, lat + h], [lng - h, lat - h]
            ]]
        }
    })
}

fn raw_documents() -> HashMap<&'static str, Value> {
    HashMap::from([
        (
            "crime",
            json!([
                {"lat": 37.7950, "lng": -122.2650},
                {"lat": 37.7950, "lng": -122.2650},
                {"lat": 37.8100, "lng": -122.2800}
            ]),
        ),
        (
            "schools",
            json!([
                {"lat": 37.8020, "lng": -122.2700},
                {"lat": 37.8120, "lng": -122.2600}
            ]),
        ),
        (
            "bart",
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": {"name": "12th St. Oakland City Center"},
                    "geometry": {"type": "Point", "coordinates": [STATION.1, STATION.0]}
                }]
            }),
        ),
        (
            "travel",
            json!({
                "type": "FeatureCollection",
                "features": [
                    tract(-122.272, 37.804, 1500.0),
                    tract(-122.255, 37.810, 2100.0),
                    tract(-122.285, 37.795, 2700.0)
                ]
            }),
        ),
        (
            "cafes",
            json!([
                {"lat": 37.8040, "lng": -122.2710, "type": "Cafes"},
                {"lat": 37.8045, "lng": -122.2705, "type": "Restaurant"},
                {"lat": 37.8000, "lng": -122.2600, "type": "Bars"}
            ]),
        ),
    ])
}

fn load(config: &AnalysisConfig) -> HashMap<String, Dataset> {
    let documents = raw_documents();
    config
        .sources
        .iter()
        .map(|source| {
            let dataset = Dataset::from_json(&documents[source.name.as_str()], &source.format).unwrap();
            (source.name.clone(), dataset)
        })
        .collect()
}

#[test]
fn test_full_run_scores_every_cell_in_unit_range() {
    let config = AnalysisConfig::from_json_str(&config().to_string()).unwrap();
    let output = run_analysis(&H3Grid::new(), &config, &load(&config)).unwrap();

    assert_eq!(output.layers.len(), 5);
    assert!(output.composite.is_normalized());
    assert_gt!(output.composite.len(), 0);
    for (_, score) in output.composite.iter() {
        assert_ge!(score, 0.0);
        assert_le!(score, 1.0);
    }
    assert_eq!(output.composite.max_value(), Some(1.0));

    for (name, layer) in &output.layers {
        assert_eq!(layer.resolution(), Resolution::Nine, "layer {name}");
        for (cell, _) in layer.iter() {
            assert!(output.composite.contains(cell), "{name} cell missing from composite");
        }
    }

    for cell in &output.suitable_cells {
        assert_gt!(output.composite.get(*cell).unwrap(), 0.75);
    }
}

#[test]
fn test_station_buffer_follows_resolution_edge_length() {
    let config = AnalysisConfig::from_json_str(&config().to_string()).unwrap();
    let output = run_analysis(&H3Grid::new(), &config, &load(&config)).unwrap();

    let grid = H3Grid::new();
    let rings = (1.0 / grid.edge_length(Resolution::Nine, hex_suitability::DistanceUnit::Kilometers)).floor() as u32;
    let expected_cells = 1 + 3 * rings * (rings + 1);

    assert_eq!(output.layers["bart"].len(), expected_cells as usize);
    let station = grid.cell_at(STATION.0, STATION.1, Resolution::Nine).unwrap();
    assert_eq!(output.layers["bart"].get(station), Some(1.0));
}

#[test]
fn test_travel_layer_prefers_short_trips() {
    let config = AnalysisConfig::from_json_str(&config().to_string()).unwrap();
    let output = run_analysis(&H3Grid::new(), &config, &load(&config)).unwrap();

    let grid = H3Grid::new();
    let fast = grid.cell_at(37.804, -122.272, Resolution::Nine).unwrap();
    let slow = grid.cell_at(37.795, -122.285, Resolution::Nine).unwrap();
    let travel = &output.layers["travel"];

    assert_eq!(travel.get(fast), Some(1.0));
    assert_eq!(travel.get(slow), Some(0.0));
}

#[test]
fn test_crime_weight_lowers_scores() {
    let base = AnalysisConfig::from_json_str(&config().to_string()).unwrap();
    let datasets = load(&base);

    let mut without_crime = base.clone();
    without_crime.set_weight("crime", 0.0).unwrap();

    let grid = H3Grid::new();
    let crime_cell = grid.cell_at(37.7950, -122.2650, Resolution::Nine).unwrap();

    let with = run_analysis(&grid, &base, &datasets).unwrap();
    let without = run_analysis(&grid, &without_crime, &datasets).unwrap();

    assert_eq!(with.composite.len(), without.composite.len());
    assert_eq!(with.composite.get(crime_cell), Some(0.0));
    assert!(without.composite.contains(crime_cell));
}

#[test]
fn test_composite_min_floor_is_selectable() {
    let mut json = config();
    json["composite_normalization"] = json!("min_floor");
    let config = AnalysisConfig::from_json_str(&json.to_string()).unwrap();
    assert_eq!(config.composite_normalization, NormalizeMode::MinFloor);

    let output = run_analysis(&H3Grid::new(), &config, &load(&config)).unwrap();
    assert_eq!(output.composite.min_value(), Some(0.0));
    assert_eq!(output.composite.max_value(), Some(1.0));
}

#[test]
fn test_non_positive_travel_time_is_rejected() {
    let config = AnalysisConfig::from_json_str(&config().to_string()).unwrap();
    let mut datasets = load(&config);
    let bad = json!({"features": [tract(-122.272, 37.804, 1500.0), tract(-122.255, 37.810, 0.0)]});
    let format = DatasetFormat::GeoJsonFeatures {
        property: "travelTime".to_string(),
    };
    datasets.insert("travel".to_string(), Dataset::from_json(&bad, &format).unwrap());

    let err = run_analysis(&H3Grid::new(), &config, &datasets).unwrap_err();
    match err {
        AnalysisError::Layer(SuitabilityError::InvalidCost { dataset, index, value }) => {
            assert_eq!(dataset, "travel");
            assert_eq!(index, 1);
            assert_eq!(value, 0.0);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_policy_on_wrong_dataset_shape_is_rejected() {
    let mut json = config();
    json["sources"][3]["policy"] = json!({"kind": "point_count"});
    let config = AnalysisConfig::from_json_str(&json.to_string()).unwrap();

    let err = run_analysis(&H3Grid::new(), &config, &load(&config)).unwrap_err();
    assert!(matches!(err, AnalysisError::Layer(SuitabilityError::PolicyMismatch { .. })));
}

#[test]
fn test_unsupported_resolution_is_rejected() {
    let mut json = config();
    json["resolution"] = json!(12);
    let err = AnalysisConfig::from_json_str(&json.to_string()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedResolution(12)));
}

#[test]
fn test_output_serializes_cells_as_strings() {
    let config = AnalysisConfig::from_json_str(&config().to_string()).unwrap();
    let output = run_analysis(&H3Grid::new(), &config, &load(&config)).unwrap();
    let json = serde_json::to_value(&output).unwrap();

    assert_eq!(json["composite"]["resolution"], 9);
    assert_eq!(json["composite"]["normalized"], true);
    let cells = json["composite"]["cells"].as_object().unwrap();
    assert_eq!(cells.len(), output.composite.len());
    assert!(json["layers"]["bart"]["cells"].is_object());
    assert_eq!(
        json["suitable_cells"].as_array().unwrap().len(),
        output.suitable_cells.len()
    );
}

#[test]
fn test_demo_config_loads_from_disk() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/oakland");
    let config = AnalysisConfig::load(dir.join("analysis.json")).unwrap();

    let datasets: HashMap<String, Dataset> = config
        .sources
        .iter()
        .map(|source| {
            let path = dir.join(source.path.as_ref().unwrap());
            (source.name.clone(), Dataset::load(path, &source.format).unwrap())
        })
        .collect();

    let output = run_analysis(&H3Grid::new(), &config, &datasets).unwrap();
    assert_eq!(output.layers.len(), 5);
    let bar = H3Grid::new().cell_at(37.8000, -122.2600, Resolution::Nine).unwrap();
    assert!(!output.layers["cafes"].is_empty());
    assert!(!output.layers["cafes"].contains(bar));
    assert_eq!(output.composite.max_value(), Some(1.0));
}
