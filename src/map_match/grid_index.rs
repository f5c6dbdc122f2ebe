use std::collections::{HashMap, HashSet};

use super::road::RoadSegment;

/// Cell edge length in degrees.
pub const GRID_CELL_SIZE_DEG: f64 = 0.01;

/// Rough meters per degree used to size query windows.
const METERS_PER_DEGREE_APPROX: f64 = 111_000.0;

/// Key of one uniform-grid cell: floor(lat / g), floor(lon / g).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub lat_idx: i32,
    pub lon_idx: i32,
}

impl CellKey {
    pub fn from_latlon(lat: f64, lon: f64) -> Self {
        CellKey {
            lat_idx: (lat / GRID_CELL_SIZE_DEG).floor() as i32,
            lon_idx: (lon / GRID_CELL_SIZE_DEG).floor() as i32,
        }
    }

    /// The 8 surrounding cells.
    ///
    /// Order: NW, N, NE, W, E, SW, S, SE
    pub fn neighbors(&self) -> [CellKey; 8] {
        let lat = self.lat_idx;
        let lon = self.lon_idx;
        [
            CellKey { lat_idx: lat + 1, lon_idx: lon - 1 },
            CellKey { lat_idx: lat + 1, lon_idx: lon },
            CellKey { lat_idx: lat + 1, lon_idx: lon + 1 },
            CellKey { lat_idx: lat, lon_idx: lon - 1 },
            CellKey { lat_idx: lat, lon_idx: lon + 1 },
            CellKey { lat_idx: lat - 1, lon_idx: lon - 1 },
            CellKey { lat_idx: lat - 1, lon_idx: lon },
            CellKey { lat_idx: lat - 1, lon_idx: lon + 1 },
        ]
    }
}

/// Uniform-grid spatial index over road ids.
///
/// A road is registered in every cell one of its vertices falls in, plus
/// the 3x3 neighbourhood of each of those cells, so that queries near a
/// cell boundary still see roads whose geometry crosses it. Queries
/// enumerate a square window sized from the search radius and return
/// deduplicated candidate ids; precise distance filtering is the
/// matcher's job.
pub struct GridIndex {
    cells: HashMap<CellKey, Vec<i64>>,
}

impl GridIndex {
    pub fn new() -> Self {
        GridIndex {
            cells: HashMap::new(),
        }
    }

    /// Register a road under every cell it touches.
    pub fn insert_road(&mut self, segment: &RoadSegment) {
        let mut keys: HashSet<CellKey> = HashSet::new();
        for (lat, lon) in segment.vertices() {
            let cell = CellKey::from_latlon(lat, lon);
            keys.insert(cell);
            keys.extend(cell.neighbors());
        }
        for key in keys {
            self.cells.entry(key).or_default().push(segment.id);
        }
    }

    /// Candidate road ids within `radius_m` of the query point, sorted
    /// ascending for deterministic downstream iteration. Candidates are
    /// collected from a square of cells and may include roads farther
    /// than the radius.
    pub fn candidates_within(&self, lat: f64, lon: f64, radius_m: f64) -> Vec<i64> {
        let radius_deg = radius_m / METERS_PER_DEGREE_APPROX;
        let half_extent = (radius_deg / GRID_CELL_SIZE_DEG).ceil() as i32 + 2;
        let center = CellKey::from_latlon(lat, lon);

        let mut ids: HashSet<i64> = HashSet::new();
        for d_lat in -half_extent..=half_extent {
            for d_lon in -half_extent..=half_extent {
                let key = CellKey {
                    lat_idx: center.lat_idx + d_lat,
                    lon_idx: center.lon_idx + d_lon,
                };
                if let Some(road_ids) = self.cells.get(&key) {
                    ids.extend(road_ids.iter().copied());
                }
            }
        }

        let mut out: Vec<i64> = ids.into_iter().collect();
        out.sort_unstable();
        out
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new()
    }
}
