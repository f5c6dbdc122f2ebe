use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadClass {
    Motorway,
    Primary,
    Secondary,
    Residential,
    Service,
    Unknown,
}

impl RoadClass {
    /// Classify the road-type tag delivered with loaded road data.
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "motorway" | "motorway_link" | "trunk" | "trunk_link" => RoadClass::Motorway,
            "primary" | "primary_link" => RoadClass::Primary,
            "secondary" | "secondary_link" | "tertiary" | "tertiary_link" => RoadClass::Secondary,
            "residential" | "living_street" => RoadClass::Residential,
            "service" | "parking_aisle" => RoadClass::Service,
            _ => RoadClass::Unknown,
        }
    }
}

/// One road polyline with its addressing metadata.
///
/// Segments are owned by the matcher; everything downstream refers to
/// them by id. Geometry follows the geo convention (x = lon, y = lat).
#[derive(Clone, Debug)]
pub struct RoadSegment {
    pub id: i64,
    pub geometry: LineString<f64>,
    pub road_class: RoadClass,
    pub max_speed: Option<f64>,
    pub one_way: bool,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub street_number: Option<String>,
    pub locality: Option<String>,
    pub admin_area: Option<String>,
}

impl RoadSegment {
    /// Polyline vertices as (lat, lon) pairs, in segment order.
    pub fn vertices(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.geometry.coords().map(|c: &Coord<f64>| (c.y, c.x))
    }

    /// Consecutive vertex pairs as (lat, lon) endpoints.
    pub fn edges(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        let coords = &self.geometry.0;
        coords.windows(2).map(|pair| {
            ((pair[0].y, pair[0].x), (pair[1].y, pair[1].x))
        })
    }

    /// Human-readable address composed from the available metadata, e.g.
    /// "12 Main St, Springfield, Illinois". None when nothing is known.
    pub fn full_address(&self) -> Option<String> {
        let street = match (&self.street_number, &self.name) {
            (Some(number), Some(name)) => Some(format!("{} {}", number, name)),
            (None, Some(name)) => Some(name.clone()),
            (Some(number), None) => Some(number.clone()),
            (None, None) => None,
        };

        let parts: Vec<&str> = [
            street.as_deref(),
            self.locality.as_deref(),
            self.admin_area.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[cfg(test)]
pub(crate) fn test_segment(id: i64, points: &[(f64, f64)]) -> RoadSegment {
    let coords: Vec<Coord<f64>> = points
        .iter()
        .map(|&(lat, lon)| Coord { x: lon, y: lat })
        .collect();
    RoadSegment {
        id,
        geometry: LineString::new(coords),
        road_class: RoadClass::Residential,
        max_speed: None,
        one_way: false,
        name: None,
        reference: None,
        street_number: None,
        locality: None,
        admin_area: None,
    }
}
