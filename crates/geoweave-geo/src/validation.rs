//! Geometry validity checks
//!
//! Structural checks (finite coordinates, closed rings of at least four
//! positions) always apply. Strict mode additionally rejects rings that cross
//! themselves, which areal operations cannot give a meaningful area for.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line};

use crate::models::{Feature, Geometry, ValidityMode};
use geoweave_core::error::{GeoweaveError, Result};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    fn absorb(&mut self, prefix: &str, other: ValidationResult) {
        for error in other.errors {
            self.add_error(format!("{}.{}", prefix, error.location), error.reason);
        }
    }
}

/// Validate a geometry
pub fn validate_geometry(geometry: &Geometry, mode: ValidityMode) -> ValidationResult {
    match geometry {
        Geometry::Point { coordinates } => validate_point(coordinates),
        Geometry::Polygon { coordinates } => validate_polygon(coordinates, mode),
        Geometry::MultiPolygon { coordinates } => {
            let mut result = ValidationResult::valid();
            if coordinates.is_empty() {
                result.add_error("MultiPolygon".to_string(), "MultiPolygon has no members".to_string());
            }
            for (i, polygon) in coordinates.iter().enumerate() {
                result.absorb(&format!("MultiPolygon[{}]", i), validate_polygon(polygon, mode));
            }
            result
        }
    }
}

/// Validate a feature's geometry, failing with `MalformedGeometry` on the first problem
pub fn ensure_valid(feature: &Feature, mode: ValidityMode) -> Result<()> {
    let result = validate_geometry(&feature.geometry, mode);
    match result.errors.into_iter().next() {
        Some(error) => Err(GeoweaveError::malformed(
            feature.id.clone(),
            format!("{}: {}", error.location, error.reason),
        )),
        None => Ok(()),
    }
}

fn validate_point(point: &[f64; 2]) -> ValidationResult {
    let mut result = ValidationResult::valid();
    if !point[0].is_finite() || !point[1].is_finite() {
        result.add_error(
            format!("Point({}, {})", point[0], point[1]),
            "Coordinates must be finite".to_string(),
        );
    }
    result
}

fn validate_polygon(rings: &[Vec<[f64; 2]>], mode: ValidityMode) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if rings.is_empty() {
        result.add_error("Polygon".to_string(), "Polygon has no exterior ring".to_string());
        return result;
    }

    for (i, ring) in rings.iter().enumerate() {
        let location = if i == 0 { "exterior".to_string() } else { format!("interior[{}]", i - 1) };

        if ring.len() < 4 {
            result.add_error(
                location,
                format!("Ring must have at least 4 points, found {}", ring.len()),
            );
            continue;
        }

        if ring.first() != ring.last() {
            result.add_error(
                location.clone(),
                "Ring must be closed (first point == last point)".to_string(),
            );
        }

        if ring.iter().any(|c| !c[0].is_finite() || !c[1].is_finite()) {
            result.add_error(location.clone(), "Coordinates must be finite".to_string());
            continue;
        }

        if mode == ValidityMode::Strict {
            if let Some((a, b)) = first_self_intersection(ring) {
                result.add_error(
                    location,
                    format!("Ring crosses itself between segments {} and {}", a, b),
                );
            }
        }
    }

    result
}

/// First pair of ring segments that touch or cross.
///
/// Neighbouring segments always share a vertex, so for them only an overlap
/// counts: a spike that doubles back along its own edge.
pub fn first_self_intersection(ring: &[[f64; 2]]) -> Option<(usize, usize)> {
    let segments: Vec<Line> = ring
        .windows(2)
        .map(|w| Line::new(Coord { x: w[0][0], y: w[0][1] }, Coord { x: w[1][0], y: w[1][1] }))
        .filter(|line| line.start != line.end)
        .collect();
    let n = segments.len();

    for i in 0..n {
        for j in (i + 1)..n {
            // first and last segments share the closing vertex
            let neighbours = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                Some(LineIntersection::Collinear { .. }) => return Some((i, j)),
                Some(LineIntersection::SinglePoint { .. }) if !neighbours => return Some((i, j)),
                _ => {}
            }
        }
    }

    None
}
