use h3o::Resolution;

// grid
pub const DEFAULT_RESOLUTION: Resolution = Resolution::Nine;
pub const MIN_ANALYSIS_RESOLUTION: Resolution = Resolution::Seven;
pub const MAX_ANALYSIS_RESOLUTION: Resolution = Resolution::Ten;

// accumulation
pub const DEFAULT_POINT_MAGNITUDE: f64 = 1.0;
pub const DEFAULT_NEIGHBOR_RING_WEIGHT: f64 = 0.5; // 1-ring share for neighbor falloff
pub const MAX_BUFFER_RINGS: u32 = 200; // about 120k cells per buffered point

// output
pub const NORMALIZED_MAX: f64 = 1.0;
pub const DEFAULT_AREA_THRESHOLD: f64 = 0.75; // composite score outlined as a suitable area
pub const DEFAULT_SUMMARY_TOP_CELLS: usize = 10;
