pub mod grid_index;
pub mod loader;
pub mod matcher;
pub mod road;

pub use grid_index::{CellKey, GridIndex, GRID_CELL_SIZE_DEG};
pub use loader::{build_segments, parse_road_records, RoadCoordinate, RoadDataError, RoadRecord};
pub use matcher::{NearestRoad, RoadMatcher, SnapOutcome, SnapResult, GPS_SIGMA_M, SNAP_SEARCH_RADIUS_M};
pub use road::{RoadClass, RoadSegment};
