use std::collections::BTreeMap;

use super::grid_index::GridIndex;
use super::road::RoadSegment;
use crate::geodesy::{haversine_m, point_segment_distance_m, project_onto_segment};

/// Search radius for snap candidates, meters.
pub const SNAP_SEARCH_RADIUS_M: f64 = 50.0;

/// Assumed GPS error scale for confidence scoring, meters.
pub const GPS_SIGMA_M: f64 = 10.0;

/// The closest road to a query point, regardless of distance.
#[derive(Clone, Debug)]
pub struct NearestRoad {
    pub road_id: i64,
    pub distance_m: f64,
    /// Closest point on the road polyline, (lat, lon).
    pub point: (f64, f64),
}

/// An accepted projection onto a road.
#[derive(Clone, Debug)]
pub struct SnapResult {
    pub original: (f64, f64),
    pub snapped: (f64, f64),
    pub road_id: i64,
    pub confidence: f64,
    pub distance_m: f64,
}

/// Outcome of a snap attempt.
#[derive(Clone, Debug)]
pub enum SnapOutcome {
    Accepted(SnapResult),
    /// The best candidate fell under the confidence threshold or beyond
    /// the distance ceiling.
    Rejected { confidence: f64, distance_m: f64 },
    /// No road in range of the spatial index query.
    NoCandidates,
}

/// Owns the road table and answers the two per-fix matching questions:
/// which road is nearest (always), and where to snap (when close and
/// confident enough).
///
/// Roads are keyed by id in a BTreeMap so full scans and tie-breaks are
/// deterministic regardless of load order.
pub struct RoadMatcher {
    roads: BTreeMap<i64, RoadSegment>,
    index: GridIndex,
}

impl RoadMatcher {
    pub fn new() -> Self {
        RoadMatcher {
            roads: BTreeMap::new(),
            index: GridIndex::new(),
        }
    }

    /// Install a batch of validated segments. Returns the number loaded.
    pub fn load(&mut self, segments: Vec<RoadSegment>) -> usize {
        let count = segments.len();
        for segment in segments {
            self.index.insert_road(&segment);
            self.roads.insert(segment.id, segment);
        }
        log::debug!("road table now holds {} segments", self.roads.len());
        count
    }

    pub fn clear(&mut self) {
        self.roads.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    pub fn road(&self, id: i64) -> Option<&RoadSegment> {
        self.roads.get(&id)
    }

    /// Closest point over every segment of one road.
    fn project_onto_road(road: &RoadSegment, lat: f64, lon: f64) -> Option<(f64, (f64, f64))> {
        let p = (lat, lon);
        let mut best: Option<(f64, (f64, f64))> = None;
        for (a, b) in road.edges() {
            let q = project_onto_segment(a, b, p);
            let d = haversine_m(lat, lon, q.0, q.1);
            if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
                best = Some((d, q));
            }
        }
        // Single-vertex geometry has no edges; fall back to the vertex
        if best.is_none() {
            if let Some((vlat, vlon)) = road.vertices().next() {
                best = Some((haversine_m(lat, lon, vlat, vlon), (vlat, vlon)));
            }
        }
        best
    }

    /// True when any vertex or any segment projection of `road` lies
    /// within `radius_m` of the query point.
    pub fn road_near_point(road: &RoadSegment, lat: f64, lon: f64, radius_m: f64) -> bool {
        for (vlat, vlon) in road.vertices() {
            if haversine_m(lat, lon, vlat, vlon) <= radius_m {
                return true;
            }
        }
        for (a, b) in road.edges() {
            if point_segment_distance_m(a, b, (lat, lon)) <= radius_m {
                return true;
            }
        }
        false
    }

    /// Candidate roads within `radius_m`, by way of the grid index.
    pub fn roads_near(&self, lat: f64, lon: f64, radius_m: f64) -> Vec<&RoadSegment> {
        self.index
            .candidates_within(lat, lon, radius_m)
            .into_iter()
            .filter_map(|id| self.roads.get(&id))
            .filter(|road| Self::road_near_point(road, lat, lon, radius_m))
            .collect()
    }

    /// Nearest road to the query point.
    ///
    /// Deliberately scans the whole road table rather than the grid so a
    /// result is guaranteed whenever any road is loaded, however far away.
    pub fn find_nearest_road(&self, lat: f64, lon: f64) -> Option<NearestRoad> {
        let mut best: Option<NearestRoad> = None;
        for (id, road) in &self.roads {
            if let Some((distance_m, point)) = Self::project_onto_road(road, lat, lon) {
                if best.as_ref().map_or(true, |b| distance_m < b.distance_m) {
                    best = Some(NearestRoad {
                        road_id: *id,
                        distance_m,
                        point,
                    });
                }
            }
        }
        best
    }

    /// Try to snap the query point onto a nearby road.
    ///
    /// Candidates come from the grid index at `SNAP_SEARCH_RADIUS_M`;
    /// each is scored with a Gaussian falloff over its projection
    /// distance and the most confident one is kept, subject to the
    /// caller's confidence threshold and distance ceiling.
    pub fn snap_to_road(
        &self,
        lat: f64,
        lon: f64,
        min_confidence: f64,
        max_distance_m: f64,
    ) -> SnapOutcome {
        let candidates = self.roads_near(lat, lon, SNAP_SEARCH_RADIUS_M);
        if candidates.is_empty() {
            return SnapOutcome::NoCandidates;
        }

        let mut best: Option<(f64, f64, (f64, f64), i64)> = None;
        for road in candidates {
            let Some((distance_m, point)) = Self::project_onto_road(road, lat, lon) else {
                continue;
            };
            let confidence = (-0.5 * (distance_m / GPS_SIGMA_M).powi(2)).exp();
            if best.as_ref().map_or(true, |(bc, ..)| confidence > *bc) {
                best = Some((confidence, distance_m, point, road.id));
            }
        }

        let Some((confidence, distance_m, snapped, road_id)) = best else {
            return SnapOutcome::NoCandidates;
        };

        if confidence < min_confidence || distance_m > max_distance_m {
            return SnapOutcome::Rejected {
                confidence,
                distance_m,
            };
        }

        SnapOutcome::Accepted(SnapResult {
            original: (lat, lon),
            snapped,
            road_id,
            confidence,
            distance_m,
        })
    }
}

impl Default for RoadMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_match::road::test_segment;

    fn matcher_with(segments: Vec<RoadSegment>) -> RoadMatcher {
        let mut m = RoadMatcher::new();
        m.load(segments);
        m
    }

    #[test]
    fn test_empty_matcher() {
        let m = RoadMatcher::new();
        assert!(m.is_empty());
        assert!(m.find_nearest_road(37.0, -122.0).is_none());
        assert!(matches!(
            m.snap_to_road(37.0, -122.0, 0.3, 50.0),
            SnapOutcome::NoCandidates
        ));
    }

    #[test]
    fn test_nearest_road_basic() {
        let m = matcher_with(vec![
            test_segment(1, &[(37.0000, -122.0000), (37.0000, -122.0010)]),
            test_segment(2, &[(37.0100, -122.0000), (37.0100, -122.0010)]),
        ]);
        let nearest = m.find_nearest_road(37.0001, -122.0005).unwrap();
        assert_eq!(nearest.road_id, 1);
        // ~11 m north of road 1
        assert!((nearest.distance_m - 11.1).abs() < 0.5, "got {}", nearest.distance_m);
        assert!((nearest.point.0 - 37.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_road_ignores_grid_range() {
        // A single road far from the query must still be found
        let m = matcher_with(vec![test_segment(9, &[(38.0, -121.0), (38.0, -121.001)])]);
        let nearest = m.find_nearest_road(37.0, -122.0).unwrap();
        assert_eq!(nearest.road_id, 9);
        assert!(nearest.distance_m > 100_000.0);
    }

    #[test]
    fn test_nearest_projects_onto_interior_vertex_spans() {
        // Multi-segment road bending around the query point
        let m = matcher_with(vec![test_segment(
            1,
            &[(37.000, -122.002), (37.000, -122.000), (37.002, -122.000)],
        )]);
        let nearest = m.find_nearest_road(37.001, -122.0005).unwrap();
        // Closest approach is the northbound leg at lon -122.000
        assert!((nearest.point.1 + 122.0).abs() < 1e-9);
        assert!((nearest.point.0 - 37.001).abs() < 1e-9);
    }

    #[test]
    fn test_road_near_point_radius() {
        let seg = test_segment(1, &[(37.0, -122.0), (37.0, -122.001)]);
        // ~55 m north of the segment
        assert!(RoadMatcher::road_near_point(&seg, 37.0005, -122.0005, 60.0));
        assert!(!RoadMatcher::road_near_point(&seg, 37.0005, -122.0005, 50.0));
    }

    #[test]
    fn test_snap_accepts_close_point() {
        let m = matcher_with(vec![test_segment(
            42,
            &[(37.0000, -122.0000), (37.0000, -122.0010)],
        )]);
        let outcome = m.snap_to_road(37.00005, -122.00005, 0.3, 50.0);
        let SnapOutcome::Accepted(snap) = outcome else {
            panic!("expected accept, got {:?}", outcome);
        };
        assert_eq!(snap.road_id, 42);
        assert!((snap.distance_m - 5.57).abs() < 0.1, "got {}", snap.distance_m);
        assert!((snap.confidence - 0.86).abs() < 0.01, "got {}", snap.confidence);
        assert!((snap.snapped.0 - 37.0).abs() < 1e-9);
        assert!((snap.snapped.1 + 122.00005).abs() < 1e-9);
        assert_eq!(snap.original, (37.00005, -122.00005));
    }

    #[test]
    fn test_snap_rejects_low_confidence() {
        let m = matcher_with(vec![test_segment(
            1,
            &[(37.0000, -122.0000), (37.0000, -122.0010)],
        )]);
        // ~33 m away: confidence exp(-0.5*3.3^2) ~ 0.004
        let outcome = m.snap_to_road(37.0003, -122.0005, 0.3, 50.0);
        let SnapOutcome::Rejected { confidence, distance_m } = outcome else {
            panic!("expected reject, got {:?}", outcome);
        };
        assert!(confidence < 0.3);
        assert!(distance_m > 30.0 && distance_m < 40.0);
    }

    #[test]
    fn test_snap_rejects_beyond_ceiling() {
        let m = matcher_with(vec![test_segment(
            1,
            &[(37.0000, -122.0000), (37.0000, -122.0010)],
        )]);
        // Permissive confidence threshold, tight ceiling
        let outcome = m.snap_to_road(37.0001, -122.0005, 0.0, 5.0);
        assert!(matches!(outcome, SnapOutcome::Rejected { .. }));
    }

    #[test]
    fn test_snap_no_candidates_out_of_range() {
        let m = matcher_with(vec![test_segment(1, &[(38.0, -121.0), (38.0, -121.001)])]);
        assert!(matches!(
            m.snap_to_road(37.0, -122.0, 0.0, 1e9),
            SnapOutcome::NoCandidates
        ));
    }

    #[test]
    fn test_snap_prefers_closest_road() {
        let m = matcher_with(vec![
            test_segment(1, &[(37.0000, -122.0000), (37.0000, -122.0010)]),
            test_segment(2, &[(37.0002, -122.0000), (37.0002, -122.0010)]),
        ]);
        // Query just north of road 1, well south of road 2
        let SnapOutcome::Accepted(snap) = m.snap_to_road(37.00003, -122.0005, 0.3, 50.0) else {
            panic!("expected accept");
        };
        assert_eq!(snap.road_id, 1);
    }

    #[test]
    fn test_clear_drops_roads() {
        let mut m = matcher_with(vec![test_segment(1, &[(37.0, -122.0), (37.0, -122.001)])]);
        assert_eq!(m.len(), 1);
        m.clear();
        assert!(m.is_empty());
        assert!(m.find_nearest_road(37.0, -122.0).is_none());
    }

    #[test]
    fn test_load_replaces_same_id() {
        let mut m = matcher_with(vec![test_segment(1, &[(37.0, -122.0), (37.0, -122.001)])]);
        m.load(vec![test_segment(1, &[(38.0, -121.0), (38.0, -121.001)])]);
        assert_eq!(m.len(), 1);
        let nearest = m.find_nearest_road(38.0, -121.0005).unwrap();
        assert_eq!(nearest.road_id, 1);
        assert!(nearest.distance_m < 1.0);
    }
}
