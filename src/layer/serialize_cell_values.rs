use std::collections::HashMap;

use h3o::{CellIndex, Resolution};
use serde::Deserialize;

pub fn serialize_cell_values<S>(cells: &HashMap<CellIndex, f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;
    // Sorted keys keep written layers diffable between runs.
    let mut sorted: Vec<(&CellIndex, &f64)> = cells.iter().collect();
    sorted.sort_unstable_by_key(|(cell, _)| **cell);

    let mut map = serializer.serialize_map(Some(sorted.len()))?;
    for (cell, value) in sorted {
        map.serialize_entry(&cell.to_string(), value)?;
    }
    map.end()
}

pub fn deserialize_cell_values<'de, D>(deserializer: D) -> Result<HashMap<CellIndex, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw_cells = HashMap::<String, f64>::deserialize(deserializer)?;
    raw_cells
        .into_iter()
        .map(|(raw, value)| {
            let cell = raw.parse::<CellIndex>().map_err(serde::de::Error::custom)?;
            Ok((cell, value))
        })
        .collect()
}

pub fn serialize_resolution<S>(resolution: &Resolution, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u8(u8::from(*resolution))
}

pub fn deserialize_resolution<'de, D>(deserializer: D) -> Result<Resolution, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = u8::deserialize(deserializer)?;
    Resolution::try_from(raw).map_err(serde::de::Error::custom)
}

pub fn serialize_cell_list<S>(cells: &[CellIndex], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(cells.iter().map(CellIndex::to_string))
}
