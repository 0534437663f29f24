/// Two-pass normalization of layer scores into [0,1]
///
/// Pass one finds the range, pass two rescales each value as
/// `(value - floor) / (max - floor)`. The floor is either 0 or the layer's
/// own minimum.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::NORMALIZED_MAX;
use crate::layer::Layer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Floor at 0; values below zero clamp to 0.
    #[default]
    ZeroFloor,
    /// Floor at the layer's minimum, for layers whose natural zero is meaningless.
    MinFloor,
}

/// Rescale a layer into [0,1].
///
/// - An empty layer is returned unchanged.
/// - A degenerate range (`max <= floor`) maps every cell to 1.0. This covers
///   all-equal layers and zero-floor layers whose best score is exactly 0.
/// - A zero-floor layer whose scores are all negative is scaled against its
///   own minimum, so the least negative cell gets 1.0 and the worst gets 0.
pub fn normalize(layer: Layer, mode: NormalizeMode) -> Layer {
    if layer.is_normalized() {
        warn!(
            cells = layer.len(),
            ?mode,
            "normalizing a layer that is already normalized"
        );
    }

    let resolution = layer.resolution();
    let (Some(max), Some(min)) = (layer.max_value(), layer.min_value()) else {
        return Layer::from_normalized(resolution, HashMap::new());
    };

    let floor = match mode {
        NormalizeMode::ZeroFloor if max >= 0.0 => 0.0,
        NormalizeMode::ZeroFloor | NormalizeMode::MinFloor => min,
    };

    let cells = layer
        .into_cells()
        .into_iter()
        .map(|(cell, value)| {
            let scaled = if max > floor {
                scale(value, floor, max).clamp(0.0, NORMALIZED_MAX)
            } else {
                NORMALIZED_MAX
            };
            (cell, scaled)
        })
        .collect();

    Layer::from_normalized(resolution, cells)
}

/// `(value - floor) / (max - floor)`, halving both terms when the range
/// overflows.
fn scale(value: f64, floor: f64, max: f64) -> f64 {
    let range = max - floor;
    if range.is_finite() {
        (value - floor) / range
    } else {
        (value / 2.0 - floor / 2.0) / (max / 2.0 - floor / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use h3o::{CellIndex, LatLng, Resolution};
    use more_asserts::{assert_ge, assert_le};

    fn cells(n: usize) -> Vec<CellIndex> {
        let origin = LatLng::new(37.80, -122.27).unwrap().to_cell(Resolution::Nine);
        origin.grid_disk::<Vec<_>>(2).into_iter().take(n).collect()
    }

    fn layer_of(values: &[f64]) -> (Vec<CellIndex>, Layer) {
        let ids = cells(values.len());
        let map = ids.iter().copied().zip(values.iter().copied()).collect();
        (ids, Layer::from_cells(Resolution::Nine, map).unwrap())
    }

    #[test]
    fn test_zero_floor_divides_by_max() {
        let (ids, layer) = layer_of(&[1.0, 2.0, 4.0]);
        let out = normalize(layer, NormalizeMode::ZeroFloor);

        assert!(out.is_normalized());
        assert_abs_diff_eq!(out.get(ids[0]).unwrap(), 0.25);
        assert_abs_diff_eq!(out.get(ids[1]).unwrap(), 0.5);
        assert_abs_diff_eq!(out.get(ids[2]).unwrap(), 1.0);
    }

    #[test]
    fn test_min_floor_stretches_full_range() {
        let (ids, layer) = layer_of(&[1.0 / 1800.0, 1.0 / 1200.0, 1.0 / 600.0]);
        let out = normalize(layer, NormalizeMode::MinFloor);

        assert_abs_diff_eq!(out.get(ids[0]).unwrap(), 0.0);
        assert_abs_diff_eq!(out.get(ids[1]).unwrap(), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(out.get(ids[2]).unwrap(), 1.0);
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let (_, layer) = layer_of(&[-3.0, -0.5, 0.0, 0.7, 2.5, 9.0]);
        for mode in [NormalizeMode::ZeroFloor, NormalizeMode::MinFloor] {
            let out = normalize(layer.clone(), mode);
            assert_eq!(out.len(), 6);
            for (_, value) in out.iter() {
                assert_ge!(value, 0.0);
                assert_le!(value, 1.0);
            }
            assert_eq!(out.max_value(), Some(1.0));
        }
    }

    #[test]
    fn test_zero_floor_clamps_negative_scores() {
        let (ids, layer) = layer_of(&[-5.0, 0.0, 2.0]);
        let out = normalize(layer, NormalizeMode::ZeroFloor);

        assert_eq!(out.get(ids[0]), Some(0.0));
        assert_eq!(out.get(ids[1]), Some(0.0));
        assert_eq!(out.get(ids[2]), Some(1.0));
    }

    #[test]
    fn test_all_equal_values_become_one() {
        for mode in [NormalizeMode::ZeroFloor, NormalizeMode::MinFloor] {
            let (_, layer) = layer_of(&[3.0, 3.0, 3.0]);
            let out = normalize(layer, mode);
            assert!(out.iter().all(|(_, value)| value == 1.0));
        }
    }

    #[test]
    fn test_zero_floor_with_zero_max_is_degenerate() {
        let (_, layer) = layer_of(&[0.0, -1.0]);
        let out = normalize(layer, NormalizeMode::ZeroFloor);
        assert!(out.iter().all(|(_, value)| value == 1.0));
    }

    #[test]
    fn test_zero_floor_all_negative_ranks_least_bad_first() {
        let (ids, layer) = layer_of(&[-1.0, -0.1, -0.55]);
        let out = normalize(layer, NormalizeMode::ZeroFloor);

        assert_eq!(out.get(ids[0]), Some(0.0));
        assert_eq!(out.get(ids[1]), Some(1.0));
        assert_abs_diff_eq!(out.get(ids[2]).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_floor_all_negative_equal_values_become_one() {
        let (_, layer) = layer_of(&[-2.0, -2.0]);
        let out = normalize(layer, NormalizeMode::ZeroFloor);
        assert!(out.iter().all(|(_, value)| value == 1.0));
    }

    #[test]
    fn test_extreme_range_does_not_overflow() {
        let (ids, layer) = layer_of(&[f64::MAX, -f64::MAX, 0.0]);

        let out = normalize(layer.clone(), NormalizeMode::MinFloor);
        assert_eq!(out.get(ids[0]), Some(1.0));
        assert_eq!(out.get(ids[1]), Some(0.0));
        assert_abs_diff_eq!(out.get(ids[2]).unwrap(), 0.5, epsilon = 1e-12);

        let out = normalize(layer, NormalizeMode::ZeroFloor);
        assert_eq!(out.get(ids[0]), Some(1.0));
        assert_eq!(out.get(ids[1]), Some(0.0));
        assert_eq!(out.get(ids[2]), Some(0.0));
        assert!(out.iter().all(|(_, value)| value.is_finite()));
    }

    #[test]
    fn test_empty_layer_is_noop() {
        let out = normalize(Layer::new(Resolution::Eight), NormalizeMode::MinFloor);
        assert!(out.is_empty());
        assert_eq!(out.resolution(), Resolution::Eight);
    }

    #[test]
    fn test_renormalizing_zero_floor_is_stable() {
        let (_, layer) = layer_of(&[0.0, 1.0, 3.0]);
        let once = normalize(layer, NormalizeMode::ZeroFloor);
        let twice = normalize(once.clone(), NormalizeMode::ZeroFloor);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_renormalizing_min_floor_can_move_values() {
        let (ids, layer) = layer_of(&[2.0, 3.0, 4.0]);
        let once = normalize(layer, NormalizeMode::ZeroFloor);
        let twice = normalize(once.clone(), NormalizeMode::MinFloor);

        assert_abs_diff_eq!(once.get(ids[0]).unwrap(), 0.5);
        assert_abs_diff_eq!(twice.get(ids[0]).unwrap(), 0.0);
    }
}
