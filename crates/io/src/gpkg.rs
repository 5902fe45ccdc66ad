// GeoPackage feature layers over SQLite

use std::path::{Path, PathBuf};

use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

use fieldmerge_recon::model::{Column, FieldValue, Record, SurveyTable};

use crate::blob;
use crate::error::GpkgError;
use crate::reproject::{self, WEB_MERCATOR, WGS84};
use crate::wkb;

const APPLICATION_ID: i32 = 0x4750_4B47; // "GPKG"
const USER_VERSION: i32 = 10200;

const UNDEFINED_CARTESIAN: i32 = -1;
const UNDEFINED_GEOGRAPHIC: i32 = 0;

const SCHEMA: &str = r#"
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);

CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);

CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
"#;

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;

const WEB_MERCATOR_WKT: &str = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],EXTENSION["PROJ4","+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"],AUTHORITY["EPSG","3857"]]"#;

// ---------------------------------------------------------------------------
// Layer discovery
// ---------------------------------------------------------------------------

/// One feature layer as declared in the GeoPackage metadata tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub name: String,
    pub geometry_column: String,
    pub geometry_type: String,
    /// EPSG code when the SRS row names one, else the raw srs_id.
    pub srs_id: i32,
    pub feature_count: usize,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn open_read_only(path: &Path) -> Result<Connection, GpkgError> {
    if !path.is_file() {
        return Err(GpkgError::Io(format!("{}: file not found", path.display())));
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let has_contents: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'gpkg_contents'",
            [],
            |_| Ok(true),
        )
        .optional()
        .map_err(|e| GpkgError::NotGeoPackage(format!("{}: {e}", path.display())))?
        .unwrap_or(false);
    if !has_contents {
        return Err(GpkgError::NotGeoPackage(format!(
            "{}: no gpkg_contents table",
            path.display()
        )));
    }
    Ok(conn)
}

/// Resolve a GeoPackage srs_id to an EPSG code where the SRS table says so.
fn resolve_srs(conn: &Connection, srs_id: i32) -> Result<i32, GpkgError> {
    let row: Option<(String, i32)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            params![srs_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(match row {
        Some((org, code)) if org.eq_ignore_ascii_case("EPSG") => code,
        _ => srs_id,
    })
}

fn layers_of(conn: &Connection) -> Result<Vec<LayerInfo>, GpkgError> {
    let mut stmt = conn.prepare(
        "SELECT c.table_name, g.column_name, g.geometry_type_name, g.srs_id
         FROM gpkg_contents c
         LEFT JOIN gpkg_geometry_columns g ON g.table_name = c.table_name
         WHERE c.data_type = 'features'
         ORDER BY c.rowid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<i32>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut layers = Vec::with_capacity(rows.len());
    for (name, column, geometry_type, srs_id) in rows {
        let Some(column) = column else {
            log::warn!("layer '{name}' has no gpkg_geometry_columns entry");
            continue;
        };
        let srs_id = resolve_srs(conn, srs_id.unwrap_or(UNDEFINED_CARTESIAN))?;
        let feature_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
            [],
            |row| row.get(0),
        )?;
        layers.push(LayerInfo {
            name,
            geometry_column: column,
            geometry_type: geometry_type.unwrap_or_else(|| "GEOMETRY".into()),
            srs_id,
            feature_count: feature_count.max(0) as usize,
        });
    }
    Ok(layers)
}

/// Feature layers in `gpkg_contents` order. Layers without a geometry
/// column registration are left out.
pub fn list_layers(path: &Path) -> Result<Vec<LayerInfo>, GpkgError> {
    let conn = open_read_only(path)?;
    layers_of(&conn)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn field_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Integer(i),
        ValueRef::Real(r) => FieldValue::Real(r),
        ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => FieldValue::Blob(b.to_vec()),
    }
}

fn sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Real(r) => Value::Real(*r),
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn read_from(conn: &Connection, path: &Path, layer: &LayerInfo) -> Result<SurveyTable, GpkgError> {
    // Attribute columns: everything except the integer primary key and the
    // geometry column.
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(&layer.name)))?;
    let columns: Vec<Column> = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                row.get::<_, i64>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(name, sql_type, pk)| {
            let is_fid = *pk == 1 && sql_type.eq_ignore_ascii_case("INTEGER");
            !is_fid && !name.eq_ignore_ascii_case(&layer.geometry_column)
        })
        .map(|(name, sql_type, _)| Column::new(name, sql_type))
        .collect();

    let mut select = vec![quote_ident(&layer.geometry_column)];
    select.extend(columns.iter().map(|c| quote_ident(&c.name)));
    let sql = format!(
        "SELECT {} FROM {} ORDER BY rowid",
        select.join(", "),
        quote_ident(&layer.name)
    );

    let mut table = SurveyTable::new(path.display().to_string(), file_stem(path));
    table.layer = layer.name.clone();
    table.srs_id = layer.srs_id;
    table.geometry_column = layer.geometry_column.clone();
    table.geometry_type = layer.geometry_type.clone();

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let geometry = match row.get_ref(0)? {
            ValueRef::Blob(bytes) => {
                let mut g = blob::decode(bytes)?;
                g.srs_id = layer.srs_id;
                if g.envelope.is_none() && !g.empty {
                    g.envelope = wkb::read(&g.wkb).ok().and_then(|geo| reproject::envelope_of(&geo));
                }
                Some(g)
            }
            ValueRef::Null => None,
            _ => return Err(GpkgError::Geometry("geometry column holds a non-blob value".into())),
        };
        let values = (0..columns.len())
            .map(|i| row.get_ref(i + 1).map(field_value))
            .collect::<Result<Vec<_>, _>>()?;
        table.records.push(Record { values, geometry });
    }
    table.columns = columns;
    Ok(table)
}

/// Read one named layer exactly as stored.
pub fn read_layer(path: &Path, layer: &str) -> Result<SurveyTable, GpkgError> {
    let conn = open_read_only(path)?;
    let info = layers_of(&conn)?
        .into_iter()
        .find(|l| l.name == layer)
        .ok_or_else(|| GpkgError::UnknownLayer(layer.to_string()))?;
    read_from(&conn, path, &info)
}

/// Load a survey file: the layer named after the file stem (else the first
/// feature layer), reprojected into `target_srs`.
pub fn read_table(path: &Path, target_srs: i32) -> Result<SurveyTable, GpkgError> {
    let conn = open_read_only(path)?;
    let layers = layers_of(&conn)?;
    let stem = file_stem(path);

    let layer = match layers.iter().find(|l| l.name == stem) {
        Some(layer) => layer,
        None => {
            let first = layers.first().ok_or(GpkgError::NoFeatureLayer)?;
            log::warn!(
                "{}: no layer named '{stem}', using '{}'",
                path.display(),
                first.name
            );
            first
        }
    };

    let mut table = read_from(&conn, path, layer)?;
    let from = table.srs_id;

    if from == UNDEFINED_CARTESIAN || from == UNDEFINED_GEOGRAPHIC {
        log::warn!(
            "{}: layer '{}' has undefined SRS {from}, assuming EPSG:{target_srs}",
            path.display(),
            table.layer
        );
    } else if from != target_srs {
        if !reproject::can_reproject(from, target_srs) {
            return Err(GpkgError::UnsupportedSrs { from, to: target_srs });
        }
        log::info!(
            "{}: reprojecting {} rows EPSG:{from} -> EPSG:{target_srs}",
            path.display(),
            table.len()
        );
        for record in &mut table.records {
            if let Some(g) = record.geometry.as_mut() {
                *g = reproject::reproject(g, target_srs)?;
            }
        }
    }

    table.srs_id = target_srs;
    for g in table.records.iter_mut().filter_map(|r| r.geometry.as_mut()) {
        g.srs_id = target_srs;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.gpkg".into());
    path.with_file_name(format!(".{name}.tmp"))
}

fn srs_row(srs_id: i32) -> Option<(&'static str, &'static str, i32, &'static str)> {
    match srs_id {
        UNDEFINED_CARTESIAN => Some(("Undefined cartesian SRS", "NONE", -1, "undefined")),
        UNDEFINED_GEOGRAPHIC => Some(("Undefined geographic SRS", "NONE", 0, "undefined")),
        WGS84 => Some(("WGS 84 geodetic", "EPSG", WGS84, WGS84_WKT)),
        WEB_MERCATOR => Some(("WGS 84 / Pseudo-Mercator", "EPSG", WEB_MERCATOR, WEB_MERCATOR_WKT)),
        _ => None,
    }
}

fn write_into(conn: &mut Connection, table: &SurveyTable, layer: &str) -> Result<(), GpkgError> {
    conn.execute_batch(&format!(
        "PRAGMA application_id = {APPLICATION_ID}; PRAGMA user_version = {USER_VERSION};"
    ))?;

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;

    let mut srs_ids = vec![UNDEFINED_CARTESIAN, UNDEFINED_GEOGRAPHIC];
    if !srs_ids.contains(&table.srs_id) {
        srs_ids.push(table.srs_id);
    }
    for srs_id in srs_ids {
        let (name, org, code, definition) = srs_row(srs_id).ok_or(GpkgError::UnsupportedSrs {
            from: table.srs_id,
            to: table.srs_id,
        })?;
        tx.execute(
            "INSERT INTO gpkg_spatial_ref_sys (srs_name, srs_id, organization, organization_coordsys_id, definition)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, srs_id, org, code, definition],
        )?;
    }

    let columns: Vec<&Column> = table
        .columns
        .iter()
        .filter(|c| {
            !c.name.eq_ignore_ascii_case("fid") && !c.name.eq_ignore_ascii_case(&table.geometry_column)
        })
        .collect();
    let column_slots: Vec<usize> = columns
        .iter()
        .filter_map(|c| table.column_index(&c.name))
        .collect();

    let mut ddl = vec![
        "\"fid\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string(),
        format!("{} {}", quote_ident(&table.geometry_column), table.geometry_type),
    ];
    for c in &columns {
        let sql_type = if c.sql_type.trim().is_empty() { "TEXT" } else { c.sql_type.as_str() };
        ddl.push(format!("{} {sql_type}", quote_ident(&c.name)));
    }
    tx.execute_batch(&format!(
        "CREATE TABLE {} ({});",
        quote_ident(layer),
        ddl.join(", ")
    ))?;

    let bounds = table.bounds();
    let last_change = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    tx.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, last_change, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            layer,
            last_change,
            bounds.map(|b| b.min_x),
            bounds.map(|b| b.min_y),
            bounds.map(|b| b.max_x),
            bounds.map(|b| b.max_y),
            table.srs_id,
        ],
    )?;
    tx.execute(
        "INSERT INTO gpkg_geometry_columns (table_name, column_name, geometry_type_name, srs_id, z, m)
         VALUES (?1, ?2, ?3, ?4, 2, 2)",
        params![layer, table.geometry_column, table.geometry_type, table.srs_id],
    )?;

    {
        let mut names = vec![quote_ident(&table.geometry_column)];
        names.extend(columns.iter().map(|c| quote_ident(&c.name)));
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(layer),
            names.join(", "),
            placeholders.join(", ")
        ))?;

        for record in &table.records {
            let mut values = Vec::with_capacity(names.len());
            values.push(match &record.geometry {
                Some(g) => {
                    let mut g = g.clone();
                    g.srs_id = table.srs_id;
                    Value::Blob(blob::encode(&g))
                }
                None => Value::Null,
            });
            for &slot in &column_slots {
                values.push(record.values.get(slot).map(sql_value).unwrap_or(Value::Null));
            }
            stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Write `table` as a single-layer GeoPackage, replacing `path` atomically.
pub fn write_table(path: &Path, table: &SurveyTable, layer: &str) -> Result<(), GpkgError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let temp = temp_sibling(path);
    if temp.exists() {
        std::fs::remove_file(&temp)?;
    }

    let result = Connection::open(&temp)
        .map_err(GpkgError::from)
        .and_then(|mut conn| {
            write_into(&mut conn, table, layer)?;
            conn.close().map_err(|(_, e)| GpkgError::from(e))
        });

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    std::fs::rename(&temp, path)?;
    log::info!("wrote {} rows to {} (layer '{layer}')", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldmerge_recon::model::{Envelope, Geometry};
    use geo::point;
    use tempfile::tempdir;

    fn point_geometry(x: f64, y: f64, srs_id: i32) -> Geometry {
        Geometry {
            srs_id,
            envelope: Some(Envelope { min_x: x, max_x: x, min_y: y, max_y: y }),
            empty: false,
            wkb: wkb::write(&geo::Geometry::Point(point!(x: x, y: y))),
        }
    }

    fn sample(srs_id: i32) -> SurveyTable {
        let mut t = SurveyTable::new("plot.gpkg", "plot");
        t.srs_id = srs_id;
        t.geometry_type = "POINT".into();
        t.columns = vec![
            Column::new("species", "TEXT"),
            Column::new("count", "INTEGER"),
            Column::new("cover", "REAL"),
        ];
        t.records = vec![
            Record {
                values: vec!["oak".into(), FieldValue::Integer(3), FieldValue::Real(0.5)],
                geometry: Some(point_geometry(1.0, 2.0, srs_id)),
            },
            Record {
                values: vec!["ash".into(), FieldValue::Null, FieldValue::Real(1.25)],
                geometry: Some(point_geometry(-4.0, 7.5, srs_id)),
            },
            Record {
                values: vec![FieldValue::Null, FieldValue::Integer(0), FieldValue::Null],
                geometry: None,
            },
        ];
        t
    }

    #[test]
    fn written_file_is_a_geopackage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.gpkg");
        write_table(&path, &sample(4326), "out").unwrap();

        let conn = Connection::open(&path).unwrap();
        let app_id: i32 = conn.query_row("PRAGMA application_id", [], |r| r.get(0)).unwrap();
        let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(app_id, APPLICATION_ID);
        assert_eq!(version, USER_VERSION);

        let (min_x, max_y): (f64, f64) = conn
            .query_row(
                "SELECT min_x, max_y FROM gpkg_contents WHERE table_name = 'out'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((min_x, max_y), (-4.0, 7.5));

        let srs: Vec<i32> = conn
            .prepare("SELECT srs_id FROM gpkg_spatial_ref_sys ORDER BY srs_id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(srs, vec![-1, 0, 4326]);
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn read_back_preserves_rows_and_types() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plot.gpkg");
        let original = sample(4326);
        write_table(&path, &original, "plot").unwrap();

        let table = read_table(&path, 4326).unwrap();
        assert_eq!(table.layer, "plot");
        assert_eq!(table.join_key, "plot");
        assert_eq!(table.geometry_type, "POINT");
        assert_eq!(table.columns, original.columns);
        assert_eq!(table.len(), 3);
        assert_eq!(table.records[0], original.records[0]);
        assert_eq!(table.value(1, "count"), Some(&FieldValue::Null));
        assert_eq!(table.value(1, "cover"), Some(&FieldValue::Real(1.25)));
        assert!(table.records[2].geometry.is_none());
    }

    #[test]
    fn falls_back_to_first_layer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload_42.gpkg");
        write_table(&path, &sample(4326), "Survey points").unwrap();

        let layers = list_layers(&path).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name, "Survey points");
        assert_eq!(layers[0].feature_count, 3);

        let table = read_table(&path, 4326).unwrap();
        assert_eq!(table.layer, "Survey points");
        assert_eq!(table.join_key, "upload_42");
        assert!(matches!(
            read_layer(&path, "missing"),
            Err(GpkgError::UnknownLayer(_))
        ));
    }

    #[test]
    fn mercator_input_is_reprojected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merc.gpkg");
        let mut t = SurveyTable::new("merc.gpkg", "merc");
        t.srs_id = WEB_MERCATOR;
        t.columns = vec![Column::new("species", "TEXT")];
        let m = reproject::to_mercator(geo::Coord { x: -3.0, y: 55.0 });
        t.records = vec![Record {
            values: vec!["oak".into()],
            geometry: Some(point_geometry(m.x, m.y, WEB_MERCATOR)),
        }];
        write_table(&path, &t, "merc").unwrap();

        let raw = read_layer(&path, "merc").unwrap();
        assert_eq!(raw.srs_id, WEB_MERCATOR);

        let table = read_table(&path, WGS84).unwrap();
        assert_eq!(table.srs_id, WGS84);
        let g = table.records[0].geometry.as_ref().unwrap();
        assert_eq!(g.srs_id, WGS84);
        let env = g.envelope.unwrap();
        assert!((env.min_x + 3.0).abs() < 1e-9);
        assert!((env.min_y - 55.0).abs() < 1e-9);
    }

    #[test]
    fn unsupported_srs_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("osgb.gpkg");
        write_table(&path, &sample(4326), "osgb").unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "INSERT INTO gpkg_spatial_ref_sys VALUES ('OSGB 1936', 27700, 'EPSG', 27700, 'x', NULL);
                 UPDATE gpkg_geometry_columns SET srs_id = 27700;",
            )
            .unwrap();
        }
        assert!(matches!(
            read_table(&path, WGS84),
            Err(GpkgError::UnsupportedSrs { from: 27700, to: 4326 })
        ));
    }

    #[test]
    fn non_geopackage_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.gpkg");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (a INTEGER);")
            .unwrap();
        assert!(matches!(read_table(&path, 4326), Err(GpkgError::NotGeoPackage(_))));
        assert!(matches!(
            read_table(&dir.path().join("absent.gpkg"), 4326),
            Err(GpkgError::Io(_))
        ));
    }

    #[test]
    fn overwrite_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.gpkg");
        write_table(&path, &sample(4326), "out").unwrap();
        let mut smaller = sample(4326);
        smaller.records.truncate(1);
        write_table(&path, &smaller, "out").unwrap();
        assert_eq!(read_table(&path, 4326).unwrap().len(), 1);
    }
}
