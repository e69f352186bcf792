//! GeoJSON extractor.
//!
//! On top of the generic file metadata this reports the feature property
//! names as phenomena (scan level 2 and up) and the bounding box of all
//! coordinates as the spatial extent (scan level 3 and up).

use async_trait::async_trait;
use fbi_core::{ExtractError, ExtractOptions, ExtractionResult, MetadataExtractor};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

use crate::generic::base_document;

/// Scan level at which property names are reported.
const PHENOMENA_LEVEL: u8 = 2;

/// Scan level at which the bounding box is computed.
const SPATIAL_LEVEL: u8 = 3;

/// Extractor for GeoJSON documents.
pub struct GeoJsonExtractor;

impl GeoJsonExtractor {
    /// Create a new GeoJSON extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for GeoJsonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataExtractor for GeoJsonExtractor {
    fn name(&self) -> &str {
        "geojson"
    }

    fn patterns(&self) -> &[&str] {
        &["*.geojson", "*.geo.json"]
    }

    async fn extract(
        &self,
        path: &Path,
        options: &ExtractOptions,
    ) -> Result<Option<ExtractionResult>, ExtractError> {
        let Some(mut base) = base_document(path, options).await? else {
            return Ok(None);
        };
        base.info
            .extra
            .insert("format".to_string(), Value::from("GeoJSON"));

        let mut result = ExtractionResult::new(base);
        if options.scan_level < PHENOMENA_LEVEL {
            return Ok(Some(result));
        }

        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| ExtractError::from_io(&path.to_string_lossy(), e))?
            .len();
        if len > options.max_content_bytes {
            warn!(
                "GeoJSON {:?} is {} bytes, over the {} byte limit; indexing file metadata only",
                path, len, options.max_content_bytes
            );
            return Ok(Some(result));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ExtractError::from_io(&path.to_string_lossy(), e))?;

        // A broken file still gets its file-level document.
        let geojson: Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!("Cannot parse GeoJSON {:?}: {}", path, e);
                return Ok(Some(result));
            }
        };

        let names = property_names(&geojson);
        if !names.is_empty() {
            result.phenomena = Some(Value::Array(
                names.into_iter().map(|n| json!({ "names": [n] })).collect(),
            ));
        }

        if options.scan_level >= SPATIAL_LEVEL {
            if let Some([min_x, min_y, max_x, max_y]) = bounding_box(&geojson) {
                result.spatial = Some(json!({
                    "coordinates": {
                        "type": "envelope",
                        "coordinates": [[min_x, max_y], [max_x, min_y]],
                    }
                }));
            }
        }

        Ok(Some(result))
    }
}

/// Sorted, de-duplicated property keys of every feature.
fn property_names(geojson: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for feature in features(geojson) {
        if let Some(props) = feature.get("properties").and_then(Value::as_object) {
            names.extend(props.keys().cloned());
        }
    }
    names
}

fn features(geojson: &Value) -> Vec<&Value> {
    match geojson.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => geojson
            .get("features")
            .and_then(Value::as_array)
            .map(|f| f.iter().collect())
            .unwrap_or_default(),
        Some("Feature") => vec![geojson],
        _ => Vec::new(),
    }
}

/// `[min_x, min_y, max_x, max_y]` over all positions in the document.
fn bounding_box(geojson: &Value) -> Option<[f64; 4]> {
    let mut bbox: Option<[f64; 4]> = None;
    visit_geometries(geojson, &mut |x, y| {
        bbox = Some(match bbox {
            None => [x, y, x, y],
            Some([a, b, c, d]) => [a.min(x), b.min(y), c.max(x), d.max(y)],
        });
    });
    bbox
}

fn visit_geometries(value: &Value, f: &mut impl FnMut(f64, f64)) {
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            for feature in value.get("features").and_then(Value::as_array).into_iter().flatten() {
                visit_geometries(feature, f);
            }
        }
        Some("Feature") => {
            if let Some(geometry) = value.get("geometry") {
                visit_geometries(geometry, f);
            }
        }
        Some("GeometryCollection") => {
            for geometry in value.get("geometries").and_then(Value::as_array).into_iter().flatten() {
                visit_geometries(geometry, f);
            }
        }
        Some(_) => {
            if let Some(coordinates) = value.get("coordinates") {
                visit_positions(coordinates, f);
            }
        }
        None => {}
    }
}

fn visit_positions(value: &Value, f: &mut impl FnMut(f64, f64)) {
    let Some(items) = value.as_array() else {
        return;
    };
    match (items.first().and_then(Value::as_f64), items.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => f(x, y),
        _ => {
            for item in items {
                visit_positions(item, f);
            }
        }
    }
}
