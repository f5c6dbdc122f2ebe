use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::road::{RoadClass, RoadSegment};

/// Errors surfaced by road loading. The road table is never touched on
/// failure; a bad record fails the whole batch.
#[derive(Debug, Error)]
pub enum RoadDataError {
    #[error("road {id}: {reason}")]
    InvalidRoad { id: i64, reason: String },

    #[error("failed to parse road data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One coordinate of a road polyline as delivered by the host.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RoadCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Wire shape of one road record in a `loadRoadData` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadRecord {
    pub id: i64,
    pub coordinates: Vec<RoadCoordinate>,
    #[serde(default)]
    pub road_type: Option<String>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub is_one_way: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub street_number: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub admin_area: Option<String>,
}

/// Parse a JSON array of road records.
pub fn parse_road_records(json: &str) -> Result<Vec<RoadRecord>, RoadDataError> {
    Ok(serde_json::from_str(json)?)
}

/// Validate records and build the matcher-owned segments.
///
/// Every record needs at least two finite, in-range coordinates; the
/// first offending record fails the batch so the caller can keep its
/// existing road table.
pub fn build_segments(records: &[RoadRecord]) -> Result<Vec<RoadSegment>, RoadDataError> {
    let mut segments = Vec::with_capacity(records.len());

    for record in records {
        if record.coordinates.len() < 2 {
            return Err(RoadDataError::InvalidRoad {
                id: record.id,
                reason: format!("polyline needs >= 2 points, got {}", record.coordinates.len()),
            });
        }

        for (i, c) in record.coordinates.iter().enumerate() {
            if !c.latitude.is_finite() || !c.longitude.is_finite() {
                return Err(RoadDataError::InvalidRoad {
                    id: record.id,
                    reason: format!("coordinate {} is not finite", i),
                });
            }
            if c.latitude.abs() > 90.0 || c.longitude.abs() > 180.0 {
                return Err(RoadDataError::InvalidRoad {
                    id: record.id,
                    reason: format!(
                        "coordinate {} out of range: ({}, {})",
                        i, c.latitude, c.longitude
                    ),
                });
            }
        }

        let coords: Vec<Coord<f64>> = record
            .coordinates
            .iter()
            .map(|c| Coord {
                x: c.longitude,
                y: c.latitude,
            })
            .collect();

        let road_class = record
            .road_type
            .as_deref()
            .map(RoadClass::from_type_tag)
            .unwrap_or(RoadClass::Unknown);

        segments.push(RoadSegment {
            id: record.id,
            geometry: LineString::new(coords),
            road_class,
            max_speed: record.max_speed,
            one_way: record.is_one_way,
            name: record.name.clone(),
            reference: record.reference.clone(),
            street_number: record.street_number.clone(),
            locality: record.locality.clone(),
            admin_area: record.admin_area.clone(),
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, coords: &[(f64, f64)]) -> RoadRecord {
        RoadRecord {
            id,
            coordinates: coords
                .iter()
                .map(|&(latitude, longitude)| RoadCoordinate {
                    latitude,
                    longitude,
                })
                .collect(),
            road_type: None,
            max_speed: None,
            is_one_way: false,
            name: None,
            reference: None,
            street_number: None,
            locality: None,
            admin_area: None,
        }
    }

    #[test]
    fn test_parse_wire_record() {
        let json = r#"[{
            "id": 100,
            "coordinates": [
                {"latitude": 37.0, "longitude": -122.0},
                {"latitude": 37.001, "longitude": -122.0}
            ],
            "roadType": "residential",
            "maxSpeed": 13.9,
            "isOneWay": true,
            "name": "Main Street",
            "ref": "CA-1",
            "streetNumber": "12",
            "locality": "Springfield",
            "adminArea": "California"
        }]"#;

        let records = parse_road_records(json).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id, 100);
        assert_eq!(r.road_type.as_deref(), Some("residential"));
        assert!(r.is_one_way);
        assert_eq!(r.reference.as_deref(), Some("CA-1"));
        assert_eq!(r.admin_area.as_deref(), Some("California"));
    }

    #[test]
    fn test_parse_minimal_record() {
        let json = r#"[{
            "id": 1,
            "coordinates": [
                {"latitude": 37.0, "longitude": -122.0},
                {"latitude": 37.001, "longitude": -122.0}
            ]
        }]"#;
        let records = parse_road_records(json).unwrap();
        assert_eq!(records[0].name, None);
        assert!(!records[0].is_one_way);
    }

    #[test]
    fn test_build_segments_classifies_road_type() {
        let mut r = record(1, &[(37.0, -122.0), (37.001, -122.0)]);
        r.road_type = Some("motorway".to_string());
        let segments = build_segments(&[r]).unwrap();
        assert_eq!(segments[0].road_class, RoadClass::Motorway);

        let r = record(2, &[(37.0, -122.0), (37.001, -122.0)]);
        let segments = build_segments(&[r]).unwrap();
        assert_eq!(segments[0].road_class, RoadClass::Unknown);
    }

    #[test]
    fn test_build_segments_preserves_vertex_order() {
        let r = record(1, &[(37.0, -122.0), (37.001, -122.001), (37.002, -122.0)]);
        let segments = build_segments(&[r]).unwrap();
        let verts: Vec<(f64, f64)> = segments[0].vertices().collect();
        assert_eq!(verts, vec![(37.0, -122.0), (37.001, -122.001), (37.002, -122.0)]);
    }

    #[test]
    fn test_short_polyline_rejected() {
        let r = record(5, &[(37.0, -122.0)]);
        let err = build_segments(&[r]).unwrap_err();
        assert!(matches!(err, RoadDataError::InvalidRoad { id: 5, .. }));
    }

    #[test]
    fn test_non_finite_coordinate_rejected() {
        let r = record(6, &[(37.0, -122.0), (f64::NAN, -122.0)]);
        assert!(build_segments(&[r]).is_err());
    }

    #[test]
    fn test_out_of_range_coordinate_rejected() {
        let r = record(7, &[(37.0, -122.0), (91.0, -122.0)]);
        assert!(build_segments(&[r]).is_err());
    }

    #[test]
    fn test_bad_record_fails_whole_batch() {
        let good = record(1, &[(37.0, -122.0), (37.001, -122.0)]);
        let bad = record(2, &[(37.0, -122.0)]);
        assert!(build_segments(&[good, bad]).is_err());
    }

    #[test]
    fn test_empty_batch_is_ok() {
        assert_eq!(build_segments(&[]).unwrap().len(), 0);
    }
}
