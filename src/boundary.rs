//! Region boundary handling.
//!
//! This module parses boundary GeoJSON into typed regions, normalizes the
//! names used to join boundaries to indicator tables, and answers
//! point-in-region lookups for map clicks.

use geo::{BoundingRect, Centroid, Contains, CoordsIter, MultiPolygon, Point, Simplify};
use geojson::FeatureCollection;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A named region boundary in WGS84 coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBoundary {
    /// Normalized region name.
    pub name: String,
    /// Region geometry.
    pub geometry: MultiPolygon<f64>,
    /// Which source produced the boundary.
    pub source: String,
}

impl RegionBoundary {
    /// Create a new boundary, normalizing the name.
    #[must_use]
    pub fn new(name: &str, geometry: MultiPolygon<f64>, source: impl Into<String>) -> Self {
        Self {
            name: normalize_name(name),
            geometry,
            source: source.into(),
        }
    }

    /// Geometric center of the region, if the geometry has area.
    #[must_use]
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geometry.centroid()
    }

    /// Whether the region contains the given WGS84 coordinate.
    ///
    /// Checks the bounding box before the full polygon test so that map-click
    /// lookups stay cheap across a whole state of boundaries.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let point = Point::new(lon, lat);
        match self.geometry.bounding_rect() {
            Some(rect) if !rect.contains(&point) => false,
            _ => self.geometry.contains(&point),
        }
    }

    /// Simplify the geometry in place with the given tolerance in degrees.
    ///
    /// A tolerance of zero keeps the full geometry.
    pub fn simplify(&mut self, tolerance: f64) {
        if tolerance > 0.0 {
            self.geometry = self.geometry.simplify(&tolerance);
        }
    }

    /// Number of coordinates in the geometry.
    #[must_use]
    pub fn coord_count(&self) -> usize {
        self.geometry.coords_count()
    }
}

/// Normalize a region name for joining across datasets.
///
/// Trims, strips trailing parenthesised qualifiers such as `(A)`, `(C)` or
/// `(NSW)`, collapses internal whitespace, and uppercases. Boundary files and
/// indicator tables disagree on all of these, so both sides of the join are
/// normalized.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    let mut name = raw.trim();
    while name.ends_with(')') {
        match name.rfind('(') {
            Some(idx) => name = name[..idx].trim_end(),
            None => break,
        }
    }
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Parse boundary GeoJSON into typed regions.
///
/// Reads the region name from `name_property` on each feature. Features with
/// a missing name or a non-polygon geometry are skipped with a warning.
///
/// # Errors
///
/// Returns an error if the payload is not a feature collection or if no
/// usable polygon features remain after skipping.
pub fn parse_boundaries(
    geojson_text: &str,
    name_property: &str,
    source: &str,
) -> Result<Vec<RegionBoundary>> {
    let collection: FeatureCollection = geojson_text
        .parse()
        .map_err(|e: geojson::Error| Error::payload_decode("boundary GeoJSON", e.to_string()))?;

    let total = collection.features.len();
    let mut boundaries = Vec::with_capacity(total);
    for feature in collection.features {
        let Some(name) = feature
            .property(name_property)
            .and_then(|value| value.as_str())
            .map(ToString::to_string)
        else {
            warn!("skipping feature without '{name_property}' property");
            continue;
        };

        let Some(geometry) = feature.geometry else {
            warn!("skipping '{name}': no geometry");
            continue;
        };

        let multi: MultiPolygon<f64> = match geometry.value {
            value @ geojson::Value::Polygon(_) => match geo::Polygon::<f64>::try_from(value) {
                Ok(polygon) => MultiPolygon(vec![polygon]),
                Err(e) => {
                    warn!("skipping '{name}': bad polygon: {e}");
                    continue;
                }
            },
            value @ geojson::Value::MultiPolygon(_) => {
                match MultiPolygon::<f64>::try_from(value) {
                    Ok(multi) => multi,
                    Err(e) => {
                        warn!("skipping '{name}': bad multipolygon: {e}");
                        continue;
                    }
                }
            }
            other => {
                warn!("skipping '{name}': unsupported geometry {}", other.type_name());
                continue;
            }
        };

        boundaries.push(RegionBoundary::new(&name, multi, source));
    }

    if boundaries.is_empty() {
        return Err(Error::payload_decode(
            "boundary GeoJSON",
            format!("no usable polygon features among {total}"),
        ));
    }

    debug!("parsed {} of {} boundary features", boundaries.len(), total);
    Ok(boundaries)
}

/// Simplify every boundary in place, logging the coordinate reduction.
pub fn simplify_all(boundaries: &mut [RegionBoundary], tolerance: f64) {
    if tolerance <= 0.0 {
        return;
    }
    let before: usize = boundaries.iter().map(RegionBoundary::coord_count).sum();
    for boundary in &mut *boundaries {
        boundary.simplify(tolerance);
    }
    let after: usize = boundaries.iter().map(RegionBoundary::coord_count).sum();
    debug!("simplified boundaries: {before} -> {after} coordinates");
}

/// Find the first region containing the given coordinate.
#[must_use]
pub fn locate<'a>(
    boundaries: &'a [RegionBoundary],
    lat: f64,
    lon: f64,
) -> Option<&'a RegionBoundary> {
    boundaries
        .iter()
        .find(|boundary| boundary.contains(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
        let ring = LineString::from(vec![
            (min_x, min_y),
            (min_x + size, min_y),
            (min_x + size, min_y + size),
            (min_x, min_y + size),
            (min_x, min_y),
        ]);
        MultiPolygon(vec![Polygon::new(ring, vec![])])
    }

    #[test]
    fn test_normalize_name_strips_suffix() {
        assert_eq!(normalize_name("Sydney (C)"), "SYDNEY");
        assert_eq!(normalize_name("Bathurst Regional (A)"), "BATHURST REGIONAL");
        assert_eq!(normalize_name("Sutherland Shire (A) (NSW)"), "SUTHERLAND SHIRE");
    }

    #[test]
    fn test_normalize_name_collapses_whitespace() {
        assert_eq!(normalize_name("  inner   west "), "INNER WEST");
    }

    #[test]
    fn test_normalize_name_idempotent() {
        let once = normalize_name("Canterbury-Bankstown (A)");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_normalize_name_unbalanced_paren() {
        // A stray closing paren without an opener is left alone
        assert_eq!(normalize_name("Weird)"), "WEIRD)");
    }

    #[test]
    fn test_region_boundary_new_normalizes() {
        let boundary = RegionBoundary::new("Sydney (C)", square(0.0, 0.0, 1.0), "test");
        assert_eq!(boundary.name, "SYDNEY");
        assert_eq!(boundary.source, "test");
    }

    #[test]
    fn test_contains() {
        let boundary = RegionBoundary::new("Sydney", square(150.0, -34.0, 1.0), "test");
        assert!(boundary.contains(-33.5, 150.5));
        assert!(!boundary.contains(-33.5, 152.5));
    }

    #[test]
    fn test_centroid() {
        let boundary = RegionBoundary::new("Sydney", square(0.0, 0.0, 1.0), "test");
        let centroid = boundary.centroid().unwrap();
        assert!((centroid.x() - 0.5).abs() < 1e-9);
        assert!((centroid.y() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_simplify_removes_collinear_points() {
        // Square with redundant midpoints along each edge
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (0.5, 0.0),
            (1.0, 0.0),
            (1.0, 0.5),
            (1.0, 1.0),
            (0.5, 1.0),
            (0.0, 1.0),
            (0.0, 0.5),
            (0.0, 0.0),
        ]);
        let mut boundary = RegionBoundary::new(
            "Sydney",
            MultiPolygon(vec![Polygon::new(ring, vec![])]),
            "test",
        );
        let before = boundary.coord_count();
        boundary.simplify(0.01);
        assert!(boundary.coord_count() < before);
    }

    #[test]
    fn test_simplify_zero_tolerance_keeps_geometry() {
        let mut boundary = RegionBoundary::new("Sydney", square(0.0, 0.0, 1.0), "test");
        let before = boundary.coord_count();
        boundary.simplify(0.0);
        assert_eq!(boundary.coord_count(), before);
    }

    #[test]
    fn test_parse_boundaries() {
        let geojson_text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"lga_name": "Sydney (C)"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[150.0, -34.0], [151.0, -34.0], [151.0, -33.0], [150.0, -33.0], [150.0, -34.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                    }
                }
            ]
        }"#;

        let boundaries = parse_boundaries(geojson_text, "lga_name", "test").unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].name, "SYDNEY");
    }

    #[test]
    fn test_parse_boundaries_multipolygon() {
        let geojson_text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"lga_name": "Islands"},
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
                            [[[2.0, 0.0], [3.0, 0.0], [3.0, 1.0], [2.0, 1.0], [2.0, 0.0]]]
                        ]
                    }
                }
            ]
        }"#;

        let boundaries = parse_boundaries(geojson_text, "lga_name", "test").unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].geometry.0.len(), 2);
    }

    #[test]
    fn test_parse_boundaries_rejects_unusable() {
        let geojson_text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"lga_name": "Nowhere"},
                    "geometry": {"type": "Point", "coordinates": [151.0, -33.0]}
                }
            ]
        }"#;

        let result = parse_boundaries(geojson_text, "lga_name", "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_boundaries_not_geojson() {
        let result = parse_boundaries("not geojson at all", "lga_name", "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_locate_first_match() {
        let boundaries = vec![
            RegionBoundary::new("West", square(150.0, -34.0, 1.0), "test"),
            RegionBoundary::new("East", square(150.5, -34.0, 1.0), "test"),
        ];

        // Point in the overlap belongs to the first region in order
        let found = locate(&boundaries, -33.5, 150.75).unwrap();
        assert_eq!(found.name, "WEST");

        let found = locate(&boundaries, -33.5, 151.25).unwrap();
        assert_eq!(found.name, "EAST");

        assert!(locate(&boundaries, -33.5, 153.0).is_none());
    }

    #[test]
    fn test_simplify_all() {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (0.5, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]);
        let mut boundaries = vec![RegionBoundary::new(
            "Sydney",
            MultiPolygon(vec![Polygon::new(ring, vec![])]),
            "test",
        )];
        let before = boundaries[0].coord_count();
        simplify_all(&mut boundaries, 0.01);
        assert!(boundaries[0].coord_count() < before);
    }
}
