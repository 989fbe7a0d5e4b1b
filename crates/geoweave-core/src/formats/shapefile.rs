//! Shapefile format reader implementation
//!
//! Shapefiles consist of multiple component files (.shp, .shx, .dbf, .prj).
//! The first three must be present. A missing .prj means EPSG:4326, which is
//! how TIGER/Line files are usually read; a .prj whose root CRS cannot be
//! resolved to an EPSG code is an error rather than a guess.

use shapefile::dbase::FieldValue as DbaseFieldValue;
use shapefile::{PolygonRing, Shape};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GeoweaveError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{FormatDataset, FormatReader, FormatValidation};
use crate::models::{Feature, Geometry};

/// Shapefile format reader
pub struct ShapefileFormatReader;

impl FormatReader for ShapefileFormatReader {
    fn read(&self, path: &Path) -> Result<FormatDataset> {
        self.verify_components(path)?;

        let mut reader =
            shapefile::Reader::from_path(path).map_err(|e| shapefile_error("open Shapefile", e))?;

        let crs = self.extract_crs(path)?;

        let mut features = Vec::new();
        for (idx, result) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = result.map_err(|e| shapefile_error("read feature", e))?;

            let id = idx.to_string();
            let geometry = match convert_shape(&shape, &id)? {
                Some(geometry) => geometry,
                None => {
                    tracing::warn!("Skipping null shape at record {}", id);
                    continue;
                }
            };

            features.push(Feature { id, geometry, properties: extract_properties(record) });
        }

        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed").to_string();

        Ok(FormatDataset { name, format_name: "Shapefile".to_string(), crs, features })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["shp"]
    }

    fn format_name(&self) -> &str {
        "Shapefile"
    }

    fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let mut validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let base = match self.get_shapefile_base(path) {
            Ok(b) => b,
            Err(e) => {
                validation.errors.push(format!("Invalid Shapefile path: {}", e));
                return Ok(validation);
            }
        };

        let component_validation =
            FormatValidator::validate_component_files(&base, &["shp", "shx", "dbf"], &["prj"]);

        Ok(FormatValidator::merge_validations(vec![validation, component_validation]))
    }
}

impl ShapefileFormatReader {
    /// Get the base path for a Shapefile (without extension)
    fn get_shapefile_base(&self, path: &Path) -> Result<PathBuf> {
        let is_shp = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("shp"))
            .unwrap_or(false);

        if !is_shp {
            return Err(GeoweaveError::InvalidPath {
                path: path.to_path_buf(),
                reason: "Not a Shapefile (.shp)".to_string(),
            });
        }

        Ok(path.with_extension(""))
    }

    /// Verify that all required Shapefile component files exist
    fn verify_components(&self, path: &Path) -> Result<()> {
        let base = self.get_shapefile_base(path)?;
        let missing: Vec<String> = ["shp", "shx", "dbf"]
            .iter()
            .filter(|ext| !base.with_extension(ext).exists())
            .map(|ext| format!(".{}", ext))
            .collect();

        if !missing.is_empty() {
            return Err(GeoweaveError::FormatError {
                format: "Shapefile".to_string(),
                message: format!("Missing required component files: {}", missing.join(", ")),
            });
        }

        Ok(())
    }

    /// Extract CRS from the Shapefile .prj file
    fn extract_crs(&self, path: &Path) -> Result<u32> {
        let prj_path = self.get_shapefile_base(path)?.with_extension("prj");

        if !prj_path.exists() {
            return Ok(4326);
        }

        let prj_content = fs::read_to_string(&prj_path).map_err(|e| GeoweaveError::FormatError {
            format: "Shapefile".to_string(),
            message: format!("Failed to read .prj file: {}", e),
        })?;

        epsg_from_prj(&prj_content).ok_or_else(|| {
            let root = parse_root(&prj_content)
                .map(|root| format!("{}[\"{}\"]", root.keyword, root.name))
                .unwrap_or_else(|| "none".to_string());
            GeoweaveError::FormatError {
                format: "Shapefile".to_string(),
                message: format!(
                    "Cannot determine EPSG code from {} (root {})",
                    prj_path.display(),
                    root
                ),
            }
        })
    }
}

/// EPSG code of the root CRS of an ESRI/OGC WKT1 string.
///
/// Only an AUTHORITY (or WKT2 ID) that is a direct child of the root counts;
/// datum, ellipsoid and base GEOGCS authorities nested below a PROJCS say
/// nothing about the projected system. Without a root authority the root
/// name is looked up among the ESRI and OGC names of the builtin systems.
pub fn epsg_from_prj(wkt: &str) -> Option<u32> {
    match parse_root(wkt) {
        Some(root) => root.authority.or_else(|| epsg_from_name(root.keyword, root.name)),
        None => wkt.trim().strip_prefix("EPSG:").and_then(|code| code.trim().parse().ok()),
    }
}

/// Root node of a WKT1 definition
struct WktRoot<'a> {
    keyword: &'a str,
    name: &'a str,
    authority: Option<u32>,
}

fn parse_root(wkt: &str) -> Option<WktRoot<'_>> {
    let wkt = wkt.trim();
    let open = wkt.find(|c: char| c == '[' || c == '(')?;
    let keyword = wkt[..open].trim();
    let body = &wkt[open + 1..];
    let name = quoted(body).unwrap_or("");

    let mut authority = None;
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut child_start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '[' | '(' => {
                if depth == 0 && authority.is_none() {
                    let child = body[child_start..i].trim();
                    if child.eq_ignore_ascii_case("AUTHORITY") || child.eq_ignore_ascii_case("ID") {
                        authority = epsg_authority(&body[i + 1..]);
                    }
                }
                depth += 1;
            }
            ']' | ')' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            ',' if depth == 0 => child_start = i + 1,
            _ => {}
        }
    }

    Some(WktRoot { keyword, name, authority })
}

/// First quoted string in `text`
fn quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(&text[start..start + len])
}

/// `"EPSG","26918"` or `"EPSG",26918`
fn epsg_authority(args: &str) -> Option<u32> {
    let args = &args[..args.find(|c: char| c == ']' || c == ')')?];
    let (authority, code) = args.split_once(',')?;
    if !authority.trim().trim_matches('"').eq_ignore_ascii_case("EPSG") {
        return None;
    }
    code.trim().trim_matches('"').parse().ok()
}

/// ESRI and OGC names of the builtin systems
fn epsg_from_name(keyword: &str, name: &str) -> Option<u32> {
    if keyword.eq_ignore_ascii_case("GEOGCS") {
        return match name {
            "GCS_WGS_1984" | "WGS 84" => Some(4326),
            "GCS_North_American_1983" | "NAD83" => Some(4269),
            "GCS_North_American_1927" | "NAD27" => Some(4267),
            _ => None,
        };
    }
    if !keyword.eq_ignore_ascii_case("PROJCS") {
        return None;
    }

    match name {
        "WGS_1984_Web_Mercator_Auxiliary_Sphere" | "WGS 84 / Pseudo-Mercator" => Some(3857),
        "WGS_1984_World_Mercator" | "WGS 84 / World Mercator" => Some(3395),
        "NAD_1983_Contiguous_USA_Albers" | "USA_Contiguous_Albers_Equal_Area_Conic_USGS_version"
        | "NAD83 / Conus Albers" => Some(5070),
        "British_National_Grid" | "OSGB 1936 / British National Grid" => Some(27700),
        "NAD_1983_StatePlane_New_York_Long_Island_FIPS_3104_Feet"
        | "NAD83 / New York Long Island (ftUS)" => Some(2263),
        "NAD_1983_StatePlane_California_III_FIPS_0403_Feet"
        | "NAD83 / California zone 3 (ftUS)" => Some(2227),
        _ => utm_epsg(name),
    }
}

/// `NAD_1983_UTM_Zone_18N`, `WGS 84 / UTM zone 33S` and friends
fn utm_epsg(name: &str) -> Option<u32> {
    let (datum, zone) = name.split_once("_UTM_Zone_").or_else(|| name.split_once(" / UTM zone "))?;
    if zone.len() < 2 || !zone.is_ascii() {
        return None;
    }
    let (number, hemisphere) = zone.split_at(zone.len() - 1);
    let number: u32 = number.parse().ok()?;

    match (datum, hemisphere) {
        ("NAD_1983" | "NAD83", "N") if (1..=23).contains(&number) => Some(26900 + number),
        ("WGS_1984" | "WGS 84", "N") if (1..=60).contains(&number) => Some(32600 + number),
        ("WGS_1984" | "WGS 84", "S") if (1..=60).contains(&number) => Some(32700 + number),
        _ => None,
    }
}

fn shapefile_error(action: &str, e: shapefile::Error) -> GeoweaveError {
    GeoweaveError::FormatError {
        format: "Shapefile".to_string(),
        message: format!("Failed to {}: {}", action, e),
    }
}

/// Convert a shape; `None` for null shapes
fn convert_shape(shape: &Shape, feature_id: &str) -> Result<Option<Geometry>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => Geometry::point(p.x, p.y),
        Shape::PointM(p) => Geometry::point(p.x, p.y),
        Shape::PointZ(p) => Geometry::point(p.x, p.y),
        Shape::Polygon(polygon) => {
            group_rings(polygon.rings().iter().map(|r| ring_coords(r, |p| [p.x, p.y])))
        }
        Shape::PolygonM(polygon) => {
            group_rings(polygon.rings().iter().map(|r| ring_coords(r, |p| [p.x, p.y])))
        }
        Shape::PolygonZ(polygon) => {
            group_rings(polygon.rings().iter().map(|r| ring_coords(r, |p| [p.x, p.y])))
        }
        other => {
            return Err(GeoweaveError::malformed(
                feature_id,
                format!("unsupported shape type {}", other.shapetype()),
            ))
        }
    };
    Ok(Some(geometry))
}

fn ring_coords<P>(ring: &PolygonRing<P>, xy: impl Fn(&P) -> [f64; 2]) -> (bool, Vec<[f64; 2]>) {
    let is_outer = matches!(ring, PolygonRing::Outer(_));
    (is_outer, ring.points().iter().map(xy).collect())
}

/// Each outer ring starts a polygon; inner rings attach to the preceding outer ring
fn group_rings(rings: impl Iterator<Item = (bool, Vec<[f64; 2]>)>) -> Geometry {
    let mut polygons: Vec<Vec<Vec<[f64; 2]>>> = Vec::new();
    for (is_outer, coords) in rings {
        match polygons.last_mut() {
            Some(polygon) if !is_outer => polygon.push(coords),
            _ => polygons.push(vec![coords]),
        }
    }

    if polygons.len() == 1 {
        Geometry::Polygon { coordinates: polygons.remove(0) }
    } else {
        Geometry::MultiPolygon { coordinates: polygons }
    }
}

fn extract_properties(record: shapefile::dbase::Record) -> HashMap<String, serde_json::Value> {
    record.into_iter().map(|(name, value)| (name, convert_dbase_value(value))).collect()
}

fn number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Convert dBase field value to JSON value
fn convert_dbase_value(value: DbaseFieldValue) -> serde_json::Value {
    match value {
        DbaseFieldValue::Character(Some(s)) => serde_json::Value::String(s.trim().to_string()),
        DbaseFieldValue::Numeric(Some(n)) => number(n),
        DbaseFieldValue::Float(Some(f)) => number(f as f64),
        DbaseFieldValue::Integer(i) => serde_json::Value::Number(i.into()),
        DbaseFieldValue::Double(d) => number(d),
        DbaseFieldValue::Currency(c) => number(c),
        DbaseFieldValue::Logical(Some(b)) => serde_json::Value::Bool(b),
        DbaseFieldValue::Memo(s) => serde_json::Value::String(s),
        DbaseFieldValue::Date(Some(date)) => serde_json::Value::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        _ => serde_json::Value::Null,
    }
}
