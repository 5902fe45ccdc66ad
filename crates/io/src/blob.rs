// GeoPackage geometry blob: "GP" header + optional envelope + WKB payload.

use fieldmerge_recon::model::{Envelope, Geometry};

use crate::error::GpkgError;

const MAGIC: [u8; 2] = *b"GP";
const HEADER_LEN: usize = 8;

const FLAG_LITTLE_ENDIAN: u8 = 0x01;
const FLAG_EMPTY: u8 = 0x10;
const FLAG_EXTENDED: u8 = 0x20;

/// Envelope byte length for each contents indicator (0..=4).
fn envelope_len(indicator: u8) -> Option<usize> {
    match indicator {
        0 => Some(0),
        1 => Some(32),
        2 | 3 => Some(48),
        4 => Some(64),
        _ => None,
    }
}

fn read_f64(bytes: &[u8], little_endian: bool) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    if little_endian {
        f64::from_le_bytes(buf)
    } else {
        f64::from_be_bytes(buf)
    }
}

/// Parse a geometry blob into its SRS, XY envelope and WKB payload.
pub fn decode(blob: &[u8]) -> Result<Geometry, GpkgError> {
    if blob.len() < HEADER_LEN || blob[..2] != MAGIC {
        return Err(GpkgError::Geometry("missing GP header".into()));
    }

    let flags = blob[3];
    if flags & FLAG_EXTENDED != 0 {
        return Err(GpkgError::Geometry("extended geometry types are not supported".into()));
    }

    let little_endian = flags & FLAG_LITTLE_ENDIAN != 0;
    let srs_bytes = [blob[4], blob[5], blob[6], blob[7]];
    let srs_id = if little_endian {
        i32::from_le_bytes(srs_bytes)
    } else {
        i32::from_be_bytes(srs_bytes)
    };

    let indicator = (flags >> 1) & 0x07;
    let env_len = envelope_len(indicator)
        .ok_or_else(|| GpkgError::Geometry(format!("invalid envelope indicator {indicator}")))?;
    let wkb_start = HEADER_LEN + env_len;
    if blob.len() < wkb_start {
        return Err(GpkgError::Geometry("truncated envelope".into()));
    }

    let envelope = (env_len > 0).then(|| {
        let env = &blob[HEADER_LEN..];
        Envelope {
            min_x: read_f64(&env[0..], little_endian),
            max_x: read_f64(&env[8..], little_endian),
            min_y: read_f64(&env[16..], little_endian),
            max_y: read_f64(&env[24..], little_endian),
        }
    });

    Ok(Geometry {
        srs_id,
        envelope,
        empty: flags & FLAG_EMPTY != 0,
        wkb: blob[wkb_start..].to_vec(),
    })
}

/// Serialize a geometry as a little-endian blob with an XY envelope when one
/// is known.
pub fn encode(geometry: &Geometry) -> Vec<u8> {
    let envelope = if geometry.empty { None } else { geometry.envelope };

    let mut flags = FLAG_LITTLE_ENDIAN;
    if geometry.empty {
        flags |= FLAG_EMPTY;
    }
    if envelope.is_some() {
        flags |= 1 << 1;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + 32 + geometry.wkb.len());
    out.extend_from_slice(&MAGIC);
    out.push(0); // version 1.0
    out.push(flags);
    out.extend_from_slice(&geometry.srs_id.to_le_bytes());
    if let Some(env) = envelope {
        for v in [env.min_x, env.max_x, env.min_y, env.max_y] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out.extend_from_slice(&geometry.wkb);
    out
}
