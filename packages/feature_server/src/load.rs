//! `GeoJSON` loading.
//!
//! Converts `GeoJSON` feature collections into the engine's
//! [`FeatureCollection`]. Collection metadata is read from the top-level
//! `bbox` and from the foreign members `name`, `description`, `geometryType`
//! and `spatialReference`.

use feature_server_models::{
    AttributeValue, Attributes, DEFAULT_OID_FIELD, Extent, Feature, FeatureCollection,
    GeometryType, SpatialReference,
};
use geojson::GeoJson;
use thiserror::Error;

/// Errors that can occur while loading feature data.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The input is JSON but not valid `GeoJSON`.
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The `GeoJSON` is valid but not a feature collection.
    #[error("Expected a FeatureCollection: {message}")]
    Shape {
        /// What was found instead.
        message: String,
    },
}

/// Converts a parsed `GeoJSON` feature collection.
///
/// Each feature's `object_id` is its numeric `GeoJSON` `id`, else its
/// integer `id` property, else its 1-based position in the collection.
/// Geometries that can't be represented are dropped with a warning; the
/// feature is kept without one.
#[must_use]
pub fn from_geojson(collection: geojson::FeatureCollection) -> FeatureCollection {
    let foreign = collection.foreign_members.unwrap_or_default();
    let text = |key: &str| foreign.get(key).and_then(|v| v.as_str()).map(ToString::to_string);

    let geometry_type = foreign
        .get("geometryType")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<GeometryType>().ok());
    let spatial_reference = foreign
        .get("spatialReference")
        .and_then(|v| serde_json::from_value::<SpatialReference>(v.clone()).ok());
    let extent = collection.bbox.as_deref().and_then(bbox_extent);

    let features = collection
        .features
        .into_iter()
        .zip(1_i64..)
        .map(|(feature, position)| convert_feature(feature, position))
        .collect();

    FeatureCollection {
        features,
        extent,
        geometry_type,
        spatial_reference,
        name: text("name"),
        description: text("description"),
    }
}

fn convert_feature(feature: geojson::Feature, position: i64) -> Feature {
    let attributes: Attributes = feature
        .properties
        .unwrap_or_default()
        .iter()
        .map(|(key, value)| (key.clone(), AttributeValue::from_json(value)))
        .collect();

    let object_id = match &feature.id {
        Some(geojson::feature::Id::Number(n)) => n.as_i64(),
        _ => None,
    }
    .or_else(|| match attributes.get(DEFAULT_OID_FIELD) {
        Some(AttributeValue::Integer(id)) => Some(*id),
        _ => None,
    })
    .unwrap_or(position);

    let geometry = feature.geometry.and_then(|geometry| {
        geo::Geometry::<f64>::try_from(geometry)
            .inspect_err(|e| log::warn!("Dropping geometry of feature {object_id}: {e}"))
            .ok()
    });

    Feature {
        object_id,
        geometry,
        attributes,
    }
}

/// Reads a 2D (`[w, s, e, n]`) or 3D (`[w, s, lo, e, n, hi]`) bbox.
fn bbox_extent(bbox: &[f64]) -> Option<Extent> {
    match *bbox {
        [xmin, ymin, xmax, ymax] | [xmin, ymin, _, xmax, ymax, _] => {
            Some(Extent::new(xmin, ymin, xmax, ymax))
        }
        _ => {
            log::warn!("Ignoring bbox with {} values", bbox.len());
            None
        }
    }
}

fn collection_from_json(value: serde_json::Value) -> Result<FeatureCollection, LoadError> {
    match GeoJson::from_json_value(value)? {
        GeoJson::FeatureCollection(collection) => Ok(from_geojson(collection)),
        GeoJson::Feature(feature) => Ok(from_geojson(geojson::FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        })),
        GeoJson::Geometry(_) => Err(LoadError::Shape {
            message: "found a bare geometry".to_string(),
        }),
    }
}

/// Parses one `GeoJSON` document into a feature collection.
///
/// A single `Feature` is accepted as a one-feature collection.
///
/// # Errors
///
/// * [`LoadError::Json`] if the input is not JSON
/// * [`LoadError::GeoJson`] if the input is not `GeoJSON`
/// * [`LoadError::Shape`] if the input is a bare geometry
pub fn parse_collection(input: &str) -> Result<FeatureCollection, LoadError> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    collection_from_json(value)
}

/// Parses a service: either one feature collection or a JSON array of them,
/// one per layer.
///
/// # Errors
///
/// Fails like [`parse_collection`] on the first layer that can't be parsed.
pub fn parse_service(input: &str) -> Result<Vec<FeatureCollection>, LoadError> {
    let value: serde_json::Value = serde_json::from_str(input)?;

    let layers = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(collection_from_json)
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![collection_from_json(other)?],
    };

    log::debug!(
        "Loaded {} layer(s) with {} features",
        layers.len(),
        layers.iter().map(|l| l.features.len()).sum::<usize>()
    );

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIONS: &str = r#"{
        "type": "FeatureCollection",
        "name": "Stations",
        "description": "Weather stations",
        "spatialReference": { "wkid": 4326 },
        "bbox": [-108.5, 38.8, -104.7, 40.0],
        "features": [
            {
                "type": "Feature",
                "id": 10,
                "geometry": { "type": "Point", "coordinates": [-104.7, 39.8] },
                "properties": { "station": "KDEN", "total precip": 0, "observed": "2015-06-24T08:18:24Z" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [-105.3, 40.0] },
                "properties": { "station": "KBOU", "total precip": 1.5, "id": 42 }
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": { "station": "KCOS", "total precip": null }
            }
        ]
    }"#;

    #[test]
    fn parses_collection_metadata() {
        let collection = parse_collection(STATIONS).unwrap();

        assert_eq!(collection.name.as_deref(), Some("Stations"));
        assert_eq!(collection.description.as_deref(), Some("Weather stations"));
        assert_eq!(collection.spatial_reference, Some(SpatialReference { wkid: 4326 }));
        assert_eq!(collection.extent, Some(Extent::new(-108.5, 38.8, -104.7, 40.0)));
        assert_eq!(collection.geometry_type, None);
    }

    #[test]
    fn resolves_object_ids() {
        let collection = parse_collection(STATIONS).unwrap();
        let ids: Vec<i64> = collection.features.iter().map(|f| f.object_id).collect();
        assert_eq!(ids, vec![10, 42, 3]);
    }

    #[test]
    fn keeps_property_order_and_types() {
        let collection = parse_collection(STATIONS).unwrap();
        let first = &collection.features[0];

        let keys: Vec<&str> = first.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["station", "total precip", "observed"]);
        assert_eq!(first.attributes["total precip"], AttributeValue::Integer(0));
        assert!(matches!(first.attributes["observed"], AttributeValue::Date(_)));
        assert!(first.geometry.is_some());
        assert!(collection.features[2].geometry.is_none());
    }

    #[test]
    fn accepts_a_single_feature() {
        let collection = parse_collection(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}}"#,
        )
        .unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.features[0].object_id, 1);
    }

    #[test]
    fn parses_multi_layer_services() {
        let input = format!("[{STATIONS}, {STATIONS}]");
        let layers = parse_service(&input).unwrap();
        assert_eq!(layers.len(), 2);

        let single = parse_service(STATIONS).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse_collection("not json"), Err(LoadError::Json(_))));
        assert!(matches!(
            parse_collection(r#"{"type":"Point","coordinates":[1,2]}"#),
            Err(LoadError::Shape { .. })
        ));
        assert!(matches!(
            parse_collection(r#"{"type":"Nonsense"}"#),
            Err(LoadError::GeoJson(_))
        ));
    }
}
