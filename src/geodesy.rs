//! Coordinate and geodesy helpers shared across the pipeline.
//!
//! All distances are meters on the WGS-84 sphere; all angles are degrees
//! unless a name says otherwise. Positions are (lat, lon) pairs in degrees.

/// WGS-84 equatorial radius, meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Flat-earth conversion used by the Kalman measurement noise.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two (lat, lon) points in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Normalise a heading into [0, 360).
pub fn normalize_heading(deg: f64) -> f64 {
    let h = deg.rem_euclid(360.0);
    // rem_euclid(360.0) can return 360.0 when deg is a tiny negative
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// Blend two headings with unit-vector averaging to avoid wrap-around
/// artifacts near 0/360.
///
/// `weight` is the trust placed in `meas_deg`; the result is normalised
/// to [0, 360).
pub fn blend_headings(base_deg: f64, meas_deg: f64, weight: f64) -> f64 {
    let b = base_deg.to_radians();
    let m = meas_deg.to_radians();
    let x = (1.0 - weight) * b.cos() + weight * m.cos();
    let y = (1.0 - weight) * b.sin() + weight * m.sin();
    if x == 0.0 && y == 0.0 {
        // Opposite headings with equal weight cancel; fall back to the measurement
        return normalize_heading(meas_deg);
    }
    normalize_heading(y.atan2(x).to_degrees())
}

/// Project point `p` onto the segment `a -> b` in degree space.
///
/// Returns the projected point, with the projection parameter clamped to
/// the segment. A degenerate segment (a == b) projects onto `a`.
pub fn project_onto_segment(
    a: (f64, f64),
    b: (f64, f64),
    p: (f64, f64),
) -> (f64, f64) {
    let d_lat = b.0 - a.0;
    let d_lon = b.1 - a.1;
    let len_sq = d_lat * d_lat + d_lon * d_lon;

    if len_sq == 0.0 {
        return a;
    }

    let t = ((p.0 - a.0) * d_lat + (p.1 - a.1) * d_lon) / len_sq;
    let t = t.clamp(0.0, 1.0);
    (a.0 + t * d_lat, a.1 + t * d_lon)
}

/// Orthogonal distance in meters from `p` to the segment `a -> b`.
pub fn point_segment_distance_m(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    let q = project_onto_segment(a, b, p);
    haversine_m(p.0, p.1, q.0, q.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SF: (f64, f64) = (37.7749, -122.4194);
    const OAK: (f64, f64) = (37.8044, -122.2712);
    const SJ: (f64, f64) = (37.3382, -121.8863);

    #[test]
    fn test_haversine_identity() {
        assert_eq!(haversine_m(SF.0, SF.1, SF.0, SF.1), 0.0);
    }

    #[test]
    fn test_haversine_symmetry() {
        let ab = haversine_m(SF.0, SF.1, OAK.0, OAK.1);
        let ba = haversine_m(OAK.0, OAK.1, SF.0, SF.1);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_triangle_inequality() {
        let ab = haversine_m(SF.0, SF.1, OAK.0, OAK.1);
        let bc = haversine_m(OAK.0, OAK.1, SJ.0, SJ.1);
        let ac = haversine_m(SF.0, SF.1, SJ.0, SJ.1);
        assert!(ac <= ab + bc + 1e-6);
    }

    #[test]
    fn test_haversine_known_scale() {
        // 0.001 deg of latitude is ~111 m
        let d = haversine_m(37.0, -122.0, 37.001, -122.0);
        assert!(d > 105.0 && d < 120.0, "got {}", d);
    }

    #[test]
    fn test_normalize_heading_range() {
        for deg in [-720.5, -360.0, -0.1, 0.0, 90.0, 359.9, 360.0, 1081.0] {
            let h = normalize_heading(deg);
            assert!((0.0..360.0).contains(&h), "{} -> {}", deg, h);
        }
        assert_eq!(normalize_heading(450.0), 90.0);
        assert_eq!(normalize_heading(-90.0), 270.0);
    }

    #[test]
    fn test_blend_headings_plain() {
        // Far from the wrap point the blend is a weighted average
        let h = blend_headings(80.0, 100.0, 0.5);
        assert!((h - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_blend_headings_wraparound() {
        // 350 and 10 blend through 0, not through 180
        let h = blend_headings(350.0, 10.0, 0.5);
        assert!(h < 5.0 || h > 355.0, "got {}", h);
    }

    #[test]
    fn test_blend_headings_full_trust() {
        let h = blend_headings(123.0, 200.0, 1.0);
        assert!((h - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_projection_midpoint() {
        let a = (37.0, -122.0);
        let b = (37.0, -122.0010);
        let p = (37.00005, -122.00005);
        let q = project_onto_segment(a, b, p);
        assert!((q.0 - 37.0).abs() < 1e-12);
        assert!((q.1 + 122.00005).abs() < 1e-12);
    }

    #[test]
    fn test_projection_clamps_to_endpoints() {
        let a = (37.0, -122.0);
        let b = (37.0, -122.0010);
        // Beyond the A end
        let q = project_onto_segment(a, b, (37.0, -121.9));
        assert_eq!(q, a);
        // Beyond the B end
        let q = project_onto_segment(a, b, (37.0, -122.2));
        assert_eq!(q, b);
    }

    #[test]
    fn test_projection_degenerate_segment() {
        let a = (37.0, -122.0);
        let q = project_onto_segment(a, a, (38.0, -121.0));
        assert_eq!(q, a);
    }

    #[test]
    fn test_point_segment_distance() {
        let a = (37.0, -122.0);
        let b = (37.0, -122.0010);
        // ~5.57 m north of the segment interior
        let d = point_segment_distance_m(a, b, (37.00005, -122.0005));
        assert!((d - 5.57).abs() < 0.1, "got {}", d);
    }
}
