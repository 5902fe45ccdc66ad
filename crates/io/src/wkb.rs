//! Minimal WKB codec for 2D geometries.
//!
//! Only what the reprojection path needs: the seven OGC simple feature types
//! in XY. Payloads with Z or M ordinates are rejected rather than flattened.

use geo::{
    Coord, Geometry as GeoGeometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};

use crate::error::GpkgError;

const POINT: u32 = 1;
const LINESTRING: u32 = 2;
const POLYGON: u32 = 3;
const MULTIPOINT: u32 = 4;
const MULTILINESTRING: u32 = 5;
const MULTIPOLYGON: u32 = 6;
const COLLECTION: u32 = 7;

// Nested collections in survey data never go this deep.
const MAX_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], GpkgError> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(GpkgError::Geometry("truncated WKB".into()));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte_order(&mut self) -> Result<(), GpkgError> {
        self.little_endian = match self.take(1)?[0] {
            0 => false,
            1 => true,
            other => return Err(GpkgError::Geometry(format!("bad WKB byte order {other}"))),
        };
        Ok(())
    }

    fn u32(&mut self) -> Result<u32, GpkgError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(if self.little_endian {
            u32::from_le_bytes(buf)
        } else {
            u32::from_be_bytes(buf)
        })
    }

    fn f64(&mut self) -> Result<f64, GpkgError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(if self.little_endian {
            f64::from_le_bytes(buf)
        } else {
            f64::from_be_bytes(buf)
        })
    }

    fn coord(&mut self) -> Result<Coord<f64>, GpkgError> {
        Ok(Coord {
            x: self.f64()?,
            y: self.f64()?,
        })
    }

    fn ring(&mut self) -> Result<LineString<f64>, GpkgError> {
        let n = self.u32()? as usize;
        let mut coords = Vec::with_capacity(n.min(4096));
        for _ in 0..n {
            coords.push(self.coord()?);
        }
        Ok(LineString::new(coords))
    }

    fn polygon(&mut self) -> Result<Polygon<f64>, GpkgError> {
        let n = self.u32()? as usize;
        let mut rings = Vec::with_capacity(n.min(64));
        for _ in 0..n {
            rings.push(self.ring()?);
        }
        let mut rings = rings.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
        Ok(Polygon::new(exterior, rings.collect()))
    }

    fn geometry(&mut self, depth: usize) -> Result<GeoGeometry<f64>, GpkgError> {
        if depth > MAX_DEPTH {
            return Err(GpkgError::Geometry("WKB nesting too deep".into()));
        }
        self.byte_order()?;
        let code = self.u32()?;
        if code > COLLECTION {
            return Err(GpkgError::Geometry(format!(
                "WKB type {code} carries Z/M ordinates or is not a simple feature type"
            )));
        }

        let geometry = match code {
            // An empty point is NaN, NaN and stays that way through reprojection.
            POINT => GeoGeometry::Point(Point::from(self.coord()?)),
            LINESTRING => GeoGeometry::LineString(self.ring()?),
            POLYGON => GeoGeometry::Polygon(self.polygon()?),
            MULTIPOINT => {
                let parts = self.parts(depth)?;
                let points = parts
                    .into_iter()
                    .map(|g| match g {
                        GeoGeometry::Point(p) => Ok(p),
                        _ => Err(GpkgError::Geometry("multipoint member is not a point".into())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                GeoGeometry::MultiPoint(MultiPoint::new(points))
            }
            MULTILINESTRING => {
                let parts = self.parts(depth)?;
                let lines = parts
                    .into_iter()
                    .map(|g| match g {
                        GeoGeometry::LineString(l) => Ok(l),
                        _ => Err(GpkgError::Geometry("multilinestring member is not a linestring".into())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                GeoGeometry::MultiLineString(MultiLineString::new(lines))
            }
            MULTIPOLYGON => {
                let parts = self.parts(depth)?;
                let polys = parts
                    .into_iter()
                    .map(|g| match g {
                        GeoGeometry::Polygon(p) => Ok(p),
                        _ => Err(GpkgError::Geometry("multipolygon member is not a polygon".into())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                GeoGeometry::MultiPolygon(MultiPolygon::new(polys))
            }
            COLLECTION => GeoGeometry::GeometryCollection(GeometryCollection(self.parts(depth)?)),
            other => return Err(GpkgError::Geometry(format!("unknown WKB type {other}"))),
        };
        Ok(geometry)
    }

    fn parts(&mut self, depth: usize) -> Result<Vec<GeoGeometry<f64>>, GpkgError> {
        let n = self.u32()? as usize;
        let mut parts = Vec::with_capacity(n.min(4096));
        for _ in 0..n {
            parts.push(self.geometry(depth + 1)?);
        }
        Ok(parts)
    }
}

/// Decode an XY WKB payload.
pub fn read(bytes: &[u8]) -> Result<GeoGeometry<f64>, GpkgError> {
    let mut reader = Reader {
        bytes,
        pos: 0,
        little_endian: true,
    };
    let geometry = reader.geometry(0)?;
    if reader.pos != bytes.len() {
        return Err(GpkgError::Geometry("trailing bytes after WKB".into()));
    }
    Ok(geometry)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn put_header(out: &mut Vec<u8>, code: u32) {
    out.push(1);
    out.extend_from_slice(&code.to_le_bytes());
}

fn put_coord(out: &mut Vec<u8>, c: Coord<f64>) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
}

fn put_ring(out: &mut Vec<u8>, ring: &LineString<f64>) {
    out.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
    for c in &ring.0 {
        put_coord(out, *c);
    }
}

fn put_polygon(out: &mut Vec<u8>, poly: &Polygon<f64>) {
    let rings = if poly.exterior().0.is_empty() {
        0
    } else {
        1 + poly.interiors().len()
    };
    out.extend_from_slice(&(rings as u32).to_le_bytes());
    if rings > 0 {
        put_ring(out, poly.exterior());
        for inner in poly.interiors() {
            put_ring(out, inner);
        }
    }
}

fn put_geometry(out: &mut Vec<u8>, geometry: &GeoGeometry<f64>) {
    match geometry {
        GeoGeometry::Point(p) => {
            put_header(out, POINT);
            put_coord(out, p.0);
        }
        GeoGeometry::LineString(l) => {
            put_header(out, LINESTRING);
            put_ring(out, l);
        }
        GeoGeometry::Polygon(p) => {
            put_header(out, POLYGON);
            put_polygon(out, p);
        }
        GeoGeometry::MultiPoint(mp) => {
            put_header(out, MULTIPOINT);
            out.extend_from_slice(&(mp.0.len() as u32).to_le_bytes());
            for p in &mp.0 {
                put_header(out, POINT);
                put_coord(out, p.0);
            }
        }
        GeoGeometry::MultiLineString(ml) => {
            put_header(out, MULTILINESTRING);
            out.extend_from_slice(&(ml.0.len() as u32).to_le_bytes());
            for l in &ml.0 {
                put_header(out, LINESTRING);
                put_ring(out, l);
            }
        }
        GeoGeometry::MultiPolygon(mp) => {
            put_header(out, MULTIPOLYGON);
            out.extend_from_slice(&(mp.0.len() as u32).to_le_bytes());
            for p in &mp.0 {
                put_header(out, POLYGON);
                put_polygon(out, p);
            }
        }
        GeoGeometry::GeometryCollection(gc) => {
            put_header(out, COLLECTION);
            out.extend_from_slice(&(gc.0.len() as u32).to_le_bytes());
            for g in &gc.0 {
                put_geometry(out, g);
            }
        }
        // Derived shapes: write their polygon form.
        GeoGeometry::Line(line) => {
            put_geometry(out, &GeoGeometry::LineString(LineString::from(*line)));
        }
        GeoGeometry::Rect(rect) => put_geometry(out, &GeoGeometry::Polygon(rect.to_polygon())),
        GeoGeometry::Triangle(tri) => {
            put_geometry(out, &GeoGeometry::Polygon(tri.to_polygon()))
        }
    }
}

/// Encode as little-endian XY WKB.
pub fn write(geometry: &GeoGeometry<f64>) -> Vec<u8> {
    let mut out = Vec::new();
    put_geometry(&mut out, geometry);
    out
}

/// OGC geometry type name of a WKB payload, read from its header.
pub fn type_name(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 5 {
        return None;
    }
    let mut code = [0u8; 4];
    code.copy_from_slice(&bytes[1..5]);
    let code = match bytes[0] {
        0 => u32::from_be_bytes(code),
        1 => u32::from_le_bytes(code),
        _ => return None,
    };
    // ISO Z/M/ZM variants share the base type's last three digits.
    Some(match code % 1000 {
        POINT => "POINT",
        LINESTRING => "LINESTRING",
        POLYGON => "POLYGON",
        MULTIPOINT => "MULTIPOINT",
        MULTILINESTRING => "MULTILINESTRING",
        MULTIPOLYGON => "MULTIPOLYGON",
        COLLECTION => "GEOMETRYCOLLECTION",
        _ => return None,
    })
}
