//! Spherical Web Mercator <-> WGS84.
//!
//! The only pair of reference systems survey files arrive in. Anything else
//! is refused with [`GpkgError::UnsupportedSrs`].

use std::f64::consts::PI;

use fieldmerge_recon::model::{Envelope, Geometry};
use geo::{BoundingRect, Coord, Geometry as GeoGeometry, MapCoords};

use crate::error::GpkgError;
use crate::wkb;

pub const WGS84: i32 = 4326;
pub const WEB_MERCATOR: i32 = 3857;

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

pub fn to_mercator(c: Coord<f64>) -> Coord<f64> {
    let lat = c.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    Coord {
        x: c.x * EARTH_RADIUS * PI / 180.0,
        y: EARTH_RADIUS * (PI / 4.0 + lat * PI / 360.0).tan().ln(),
    }
}

pub fn to_wgs84(c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: c.x / EARTH_RADIUS * 180.0 / PI,
        y: (2.0 * (c.y / EARTH_RADIUS).exp().atan() - PI / 2.0) * 180.0 / PI,
    }
}

fn transform(from: i32, to: i32) -> Result<fn(Coord<f64>) -> Coord<f64>, GpkgError> {
    match (from, to) {
        (WGS84, WEB_MERCATOR) => Ok(to_mercator),
        (WEB_MERCATOR, WGS84) => Ok(to_wgs84),
        _ => Err(GpkgError::UnsupportedSrs { from, to }),
    }
}

/// Whether `from` can be brought into `to` (identity included).
pub fn can_reproject(from: i32, to: i32) -> bool {
    from == to || transform(from, to).is_ok()
}

/// XY envelope of a decoded geometry, if it has any coordinates.
pub fn envelope_of(geometry: &GeoGeometry<f64>) -> Option<Envelope> {
    geometry.bounding_rect().map(|r| Envelope {
        min_x: r.min().x,
        max_x: r.max().x,
        min_y: r.min().y,
        max_y: r.max().y,
    })
}

/// Reproject one feature geometry, rewriting its WKB, SRS and envelope.
pub fn reproject(geometry: &Geometry, to: i32) -> Result<Geometry, GpkgError> {
    if geometry.srs_id == to {
        return Ok(geometry.clone());
    }
    let f = transform(geometry.srs_id, to)?;
    if geometry.empty {
        return Ok(Geometry {
            srs_id: to,
            envelope: None,
            ..geometry.clone()
        });
    }

    let projected = wkb::read(&geometry.wkb)?.map_coords(f);
    Ok(Geometry {
        srs_id: to,
        envelope: envelope_of(&projected),
        empty: false,
        wkb: wkb::write(&projected),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn known_mercator_values() {
        let m = to_mercator(Coord { x: 180.0, y: 0.0 });
        assert!(close(m.x, 20_037_508.342_789_244, 1e-6));
        assert!(close(m.y, 0.0, 1e-6));

        let london = to_mercator(Coord { x: -0.1276, y: 51.5072 });
        assert!(close(london.x, -14_204.4, 1.0));
        assert!(close(london.y, 6_711_506.7, 1.0));
    }

    #[test]
    fn inverse_recovers_input() {
        for (x, y) in [(0.0, 0.0), (-3.2, 55.9), (151.2, -33.8), (179.9, 84.0)] {
            let back = to_wgs84(to_mercator(Coord { x, y }));
            assert!(close(back.x, x, 1e-9), "{x} vs {}", back.x);
            assert!(close(back.y, y, 1e-9), "{y} vs {}", back.y);
        }
    }

    #[test]
    fn poles_are_clamped() {
        let m = to_mercator(Coord { x: 0.0, y: 90.0 });
        assert!(m.y.is_finite());
        assert!(close(to_wgs84(m).y, MAX_LATITUDE, 1e-6));
    }

    #[test]
    fn reproject_rewrites_payload_and_envelope() {
        let wkb = wkb::write(&GeoGeometry::Point(point!(x: 20_037_508.342_789_244, y: 0.0)));
        let g = Geometry {
            srs_id: WEB_MERCATOR,
            envelope: None,
            empty: false,
            wkb,
        };
        let out = reproject(&g, WGS84).unwrap();
        assert_eq!(out.srs_id, WGS84);
        let env = out.envelope.unwrap();
        assert!(close(env.min_x, 180.0, 1e-9));
        assert!(close(env.min_y, 0.0, 1e-9));
    }

    #[test]
    fn same_srs_is_identity_and_other_pairs_fail() {
        let g = Geometry {
            srs_id: 27700,
            envelope: None,
            empty: false,
            wkb: vec![1, 2, 3],
        };
        assert_eq!(reproject(&g, 27700).unwrap(), g);
        assert!(matches!(
            reproject(&g, WGS84),
            Err(GpkgError::UnsupportedSrs { from: 27700, to: 4326 })
        ));
        assert!(can_reproject(WGS84, WEB_MERCATOR));
        assert!(!can_reproject(27700, WGS84));
    }
}
