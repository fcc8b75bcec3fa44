//! Coordinate conversion module
//!
//! Converts geographic WGS84 coordinates (latitude/longitude) to the Dutch
//! Rijksdriehoeksstelsel (RD New, EPSG:28992), the projected CRS the basemap
//! pyramid and the building tileset are expressed in.

use thiserror::Error;

/// Southern limit of the area the RD approximation is valid for.
pub const RD_MIN_LAT: f64 = 50.0;
/// Northern limit of the area the RD approximation is valid for.
pub const RD_MAX_LAT: f64 = 54.0;
/// Western limit of the area the RD approximation is valid for.
pub const RD_MIN_LON: f64 = 2.5;
/// Eastern limit of the area the RD approximation is valid for.
pub const RD_MAX_LON: f64 = 7.6;

// Amersfoort, the RD origin shifted by the false easting/northing
const REFERENCE_LAT: f64 = 52.155_174_40;
const REFERENCE_LON: f64 = 5.387_206_21;
const REFERENCE_X: f64 = 155_000.0;
const REFERENCE_Y: f64 = 463_000.0;

/// Errors for coordinates outside the supported range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude {0}: RD conversion supports {min}..={max}", min = RD_MIN_LAT, max = RD_MAX_LAT)]
    InvalidLatitude(f64),

    #[error("Invalid longitude {0}: RD conversion supports {min}..={max}", min = RD_MIN_LON, max = RD_MAX_LON)]
    InvalidLongitude(f64),
}

/// A point in RD New, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RdPoint {
    pub x: f64,
    pub y: f64,
}

/// Converts WGS84 coordinates to RD New.
///
/// Uses the official polynomial approximation around Amersfoort, accurate to
/// about a metre across the Netherlands.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees
/// * `lon` - Longitude in degrees
#[inline]
pub fn wgs84_to_rd(lat: f64, lon: f64) -> Result<RdPoint, CoordError> {
    if !(RD_MIN_LAT..=RD_MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(RD_MIN_LON..=RD_MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }

    let d_lat = 0.36 * (lat - REFERENCE_LAT);
    let d_lon = 0.36 * (lon - REFERENCE_LON);

    let x = REFERENCE_X + 190_094.945 * d_lon
        - 11_832.228 * d_lat * d_lon
        - 114.221 * d_lat.powi(2) * d_lon
        - 32.391 * d_lon.powi(3)
        - 0.705 * d_lat
        - 2.340 * d_lat.powi(3) * d_lon
        - 0.608 * d_lat * d_lon.powi(3);

    let y = REFERENCE_Y + 309_056.544 * d_lat + 3_638.893 * d_lon.powi(2)
        - 157.984 * d_lat * d_lon.powi(2)
        + 72.971 * d_lat.powi(2)
        + 59.797 * d_lat.powi(3)
        - 6.434 * d_lat.powi(2) * d_lon.powi(2)
        + 0.093 * d_lon.powi(4);

    Ok(RdPoint { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_point() {
        let point = wgs84_to_rd(REFERENCE_LAT, REFERENCE_LON).unwrap();
        assert!((point.x - 155_000.0).abs() < 1e-6);
        assert!((point.y - 463_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_amsterdam_dam_square() {
        let point = wgs84_to_rd(52.373_1, 4.892_6).unwrap();
        assert!((point.x - 121_400.0).abs() < 1_000.0, "x = {}", point.x);
        assert!((point.y - 487_400.0).abs() < 1_000.0, "y = {}", point.y);
    }

    #[test]
    fn test_invalid_latitude() {
        assert_eq!(wgs84_to_rd(40.0, 5.0), Err(CoordError::InvalidLatitude(40.0)));
    }

    #[test]
    fn test_invalid_longitude() {
        assert_eq!(wgs84_to_rd(52.0, -1.0), Err(CoordError::InvalidLongitude(-1.0)));
    }

    proptest! {
        #[test]
        fn prop_east_and_north_are_monotonic(
            lat in 50.8f64..53.5,
            lon in 3.4f64..7.2,
            step in 0.001f64..0.1,
        ) {
            let base = wgs84_to_rd(lat, lon).unwrap();
            let east = wgs84_to_rd(lat, lon + step).unwrap();
            let north = wgs84_to_rd(lat + step, lon).unwrap();

            prop_assert!(east.x > base.x);
            prop_assert!(north.y > base.y);
        }
    }
}
