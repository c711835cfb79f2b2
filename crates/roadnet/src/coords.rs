//! Pixel → projected → geographic coordinates.

use geo::AffineTransform;
use proj4rs::proj::Proj;
use roadnet_common::GeoReference;

use crate::error::{Result, RoadGraphError};
use crate::traits::CoordinateTransform;

/// Spherical mercator radius (EPSG:3857)
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Projected space is already longitude/latitude
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CoordinateTransform for IdentityTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if x.is_finite() && y.is_finite() {
            Ok((x, y))
        } else {
            Err(RoadGraphError::Transform(format!("non-finite coordinate ({x}, {y})")))
        }
    }
}

/// Inverse spherical mercator: EPSG:3857 meters to WGS84 degrees
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercatorToWgs84;

impl CoordinateTransform for WebMercatorToWgs84 {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(RoadGraphError::Transform(format!("non-finite coordinate ({x}, {y})")));
        }
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
        Ok((lon, lat))
    }
}

const WGS84_LONGLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Any projected CRS given as a PROJ.4 definition, to WGS84 degrees
pub struct ProjTransform {
    source: Proj,
    target: Proj,
}

impl ProjTransform {
    pub fn from_proj_string(definition: &str) -> Result<Self> {
        let parse = |definition: &str| {
            Proj::from_proj_string(definition)
                .map_err(|e| RoadGraphError::Transform(format!("invalid projection {definition:?}: {e}")))
        };
        Ok(Self {
            source: parse(definition)?,
            target: parse(WGS84_LONGLAT)?,
        })
    }

    /// WGS84 / UTM, the EPSG:326xx (north) and EPSG:327xx (south) family
    pub fn utm(zone: u8, south: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(RoadGraphError::Transform(format!("UTM zone {zone} outside 1..=60")));
        }
        let hemisphere = if south { " +south" } else { "" };
        Self::from_proj_string(&format!("+proj=utm +zone={zone}{hemisphere} +datum=WGS84 +units=m +no_defs"))
    }
}

impl CoordinateTransform for ProjTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(RoadGraphError::Transform(format!("non-finite coordinate ({x}, {y})")));
        }
        let mut point = (x, y, 0.0);
        proj4rs::transform::transform(&self.source, &self.target, &mut point)
            .map_err(|e| RoadGraphError::Transform(format!("cannot reproject ({x}, {y}): {e}")))?;
        // longlat output is in radians
        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        if lon.is_finite() && lat.is_finite() {
            Ok((lon, lat))
        } else {
            Err(RoadGraphError::Transform(format!("({x}, {y}) has no geographic position")))
        }
    }
}

/// Transform from a CRS identifier to WGS84. Accepts the WGS84 and web
/// mercator ids, WGS84 / UTM EPSG codes and raw `+proj=` definitions.
pub fn transform_for_crs(crs: &str) -> Result<Box<dyn CoordinateTransform>> {
    let trimmed = crs.trim();
    if trimmed.starts_with("+proj=") {
        if trimmed.starts_with("+proj=longlat") || trimmed.starts_with("+proj=latlong") {
            return Ok(Box::new(IdentityTransform));
        }
        return Ok(Box::new(ProjTransform::from_proj_string(trimmed)?));
    }

    let normalized = trimmed.to_ascii_uppercase();
    match normalized.as_str() {
        "EPSG:4326" | "OGC:CRS84" | "CRS84" | "WGS84" => Ok(Box::new(IdentityTransform)),
        "EPSG:3857" | "EPSG:900913" => Ok(Box::new(WebMercatorToWgs84)),
        _ => match utm_zone(&normalized) {
            Some((zone, south)) => Ok(Box::new(ProjTransform::utm(zone, south)?)),
            None => Err(RoadGraphError::Transform(format!("unsupported CRS {crs:?}"))),
        },
    }
}

/// `EPSG:326NN` / `EPSG:327NN` to `(zone, south)`
fn utm_zone(normalized: &str) -> Option<(u8, bool)> {
    let code = normalized.strip_prefix("EPSG:")?;
    let (prefix, zone) = (code.get(..3)?, code.get(3..)?);
    let south = match prefix {
        "326" => false,
        "327" => true,
        _ => return None,
    };
    if zone.len() != 2 {
        return None;
    }
    Some((zone.parse().ok()?, south))
}

/// GDAL-ordered coefficients as a `geo` affine transform
pub fn affine_from_gdal(geo: &GeoReference) -> AffineTransform<f64> {
    let [x0, a, b, y0, d, e] = geo.gdal;
    AffineTransform::new(a, b, x0, d, e, y0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    #[test]
    fn test_affine_matches_gdal_formula() {
        let geo = GeoReference::from_gdal([1000.0, 10.0, 0.5, 5000.0, 0.25, -10.0], "EPSG:3857");
        let affine = affine_from_gdal(&geo);

        let projected = affine.apply(Coord { x: 3.5, y: 7.5 });
        let expected = geo.pixel_to_projected(3.5, 7.5);
        assert!((projected.x - expected.0).abs() < 1e-9);
        assert!((projected.y - expected.1).abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_inverse() {
        let t = WebMercatorToWgs84;
        let (lon, lat) = t.transform(0.0, 0.0).unwrap();
        assert!(lon.abs() < 1e-12 && lat.abs() < 1e-12);

        // half the world width is 180 degrees
        let (lon, _) = t.transform(std::f64::consts::PI * EARTH_RADIUS, 0.0).unwrap();
        assert!((lon - 180.0).abs() < 1e-9);

        // London, roughly
        let (lon, lat) = t.transform(-14_222.178, 6_711_533.533).unwrap();
        assert!((lon - -0.12776).abs() < 1e-4);
        assert!((lat - 51.50735).abs() < 1e-4);
    }

    #[test]
    fn test_transform_lookup() {
        assert!(transform_for_crs("EPSG:4326").is_ok());
        assert!(transform_for_crs("epsg:3857").is_ok());
        assert!(transform_for_crs("EPSG:32633").is_ok());
        assert!(transform_for_crs("+proj=longlat +datum=WGS84").is_ok());
        for unsupported in ["EPSG:2154", "EPSG:32661", "EPSG:3260", "LOCAL:site"] {
            assert!(
                matches!(transform_for_crs(unsupported), Err(RoadGraphError::Transform(_))),
                "{unsupported}"
            );
        }
        assert!(IdentityTransform.transform(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_utm_zone_codes() {
        assert_eq!(utm_zone("EPSG:32633"), Some((33, false)));
        assert_eq!(utm_zone("EPSG:32701"), Some((1, true)));
        assert_eq!(utm_zone("EPSG:4326"), None);
        assert_eq!(utm_zone("EPSG:326333"), None);
    }

    #[test]
    fn test_utm_to_wgs84() {
        // central meridian of zone 33 on the equator
        let north = transform_for_crs("EPSG:32633").unwrap();
        let (lon, lat) = north.transform(500_000.0, 0.0).unwrap();
        assert!((lon - 15.0).abs() < 1e-6, "{lon}");
        assert!(lat.abs() < 1e-6, "{lat}");

        // southern zones carry a 10 000 km false northing
        let south = transform_for_crs("EPSG:32733").unwrap();
        let (lon, lat) = south.transform(500_000.0, 10_000_000.0).unwrap();
        assert!((lon - 15.0).abs() < 1e-6 && lat.abs() < 1e-6);

        // three degrees west of the zone 31 meridian
        let west = ProjTransform::utm(31, false).unwrap();
        let (lon, lat) = west.transform(166_021.443, 0.0).unwrap();
        assert!(lon.abs() < 1e-4, "{lon}");
        assert!(lat.abs() < 1e-6);

        assert!(ProjTransform::utm(0, false).is_err());
        assert!(west.transform(f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_proj_string_definitions() {
        let utm = transform_for_crs("+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs").unwrap();
        let (lon, _) = utm.transform(500_000.0, 0.0).unwrap();
        assert!((lon - 15.0).abs() < 1e-6);
        assert!(transform_for_crs("+proj=nonsense").is_err());
    }
}
