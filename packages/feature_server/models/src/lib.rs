#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature, attribute and field types for the feature server query engine.
//!
//! These types describe the in-memory feature collections the engine queries
//! and the protocol-shaped documents it produces. They carry no query logic;
//! filtering and aggregation live in `feature_server`.

pub mod documents;

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

pub use documents::{
    AuthInfo, CURRENT_VERSION, CountResult, FeatureResult, IdsResult, LayerReference, LayersDocument,
    OutputFeature, ResultDocument, ServerInfo, ServiceDocument, ServiceInfo, StatisticsResult,
};

/// Name of the synthesized identifier field when the caller doesn't override it.
pub const DEFAULT_OID_FIELD: &str = "id";

/// Spatial reference assumed when a collection doesn't declare one (WGS84).
pub const DEFAULT_WKID: u32 = 4326;

/// Maximum number of features returned in a single response.
pub const MAX_RECORD_COUNT: usize = 1000;

/// A single attribute value.
///
/// Dates serialize as epoch milliseconds, which is how the protocol encodes
/// `esriFieldTypeDate` values. Everything else serializes as the plain JSON
/// scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Whole number.
    Integer(i64),
    /// Number with a fractional part (or outside the `i64` range).
    Double(f64),
    /// Timestamp, normalized to UTC.
    Date(DateTime<Utc>),
    /// Any other text.
    String(String),
}

impl AttributeValue {
    /// Converts a JSON value into an attribute value.
    ///
    /// Strings that look like dates become [`AttributeValue::Date`]. Arrays and
    /// objects are kept as their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Double(n.as_f64().unwrap_or(f64::NAN)), Self::Integer),
            serde_json::Value::String(s) => {
                parse_date(s).map_or_else(|| Self::String(s.clone()), Self::Date)
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Self::String(value.to_string())
            }
        }
    }

    /// Returns the numeric value, if this attribute has one.
    ///
    /// Dates are returned as epoch milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            Self::Date(dt) => Some(dt.timestamp_millis() as f64),
            Self::Null | Self::Bool(_) | Self::String(_) => None,
        }
    }

    /// Returns `true` for [`AttributeValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Date(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::Date(dt) => serializer.serialize_i64(dt.timestamp_millis()),
            Self::String(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// Parses the date notations commonly found in feature properties.
///
/// Accepts RFC 3339, ISO 8601 date-times with or without fractional
/// seconds, plain ISO dates, and the JavaScript `Date#toString` form
/// (`"Wed Jun 24 2015 08:18:24"`, optionally followed by a zone suffix which
/// is ignored).
#[must_use]
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    let head: Vec<&str> = s.split_whitespace().take(5).collect();
    if head.len() == 5
        && let Ok(naive) = NaiveDateTime::parse_from_str(&head.join(" "), "%a %b %d %Y %H:%M:%S")
    {
        return Some(naive.and_utc());
    }

    None
}

/// Attribute mapping of a feature, in source document order.
pub type Attributes = IndexMap<String, AttributeValue>;

/// One geometry plus its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Numeric identifier resolved when the collection was loaded.
    pub object_id: i64,
    /// Feature geometry. `None` for attribute-only records.
    pub geometry: Option<geo::Geometry<f64>>,
    /// Attribute values keyed by field name.
    pub attributes: Attributes,
}

impl Feature {
    /// Returns the value of the identifier field `field`.
    ///
    /// Falls back to [`Feature::object_id`] when the attributes don't carry
    /// the field.
    #[must_use]
    pub fn identifier(&self, field: &str) -> AttributeValue {
        self.attributes
            .get(field)
            .cloned()
            .unwrap_or(AttributeValue::Integer(self.object_id))
    }

    /// Returns the value of `field`, resolving the identifier field
    /// `oid_field` through [`Feature::identifier`] so a synthesized
    /// identifier can be filtered and aggregated on like any attribute.
    #[must_use]
    pub fn value(&self, field: &str, oid_field: &str) -> Option<AttributeValue> {
        if field == oid_field {
            return Some(self.identifier(oid_field));
        }
        self.attributes.get(field).cloned()
    }
}

/// An ordered set of features with optional collection-level metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    /// Features in source order.
    pub features: Vec<Feature>,
    /// Precomputed bounding box of all features.
    pub extent: Option<Extent>,
    /// Declared geometry type of the collection.
    pub geometry_type: Option<GeometryType>,
    /// Declared spatial reference of the coordinates.
    pub spatial_reference: Option<SpatialReference>,
    /// Collection name.
    pub name: Option<String>,
    /// Collection description.
    pub description: Option<String>,
}

impl FeatureCollection {
    /// Creates a collection from bare features with no metadata.
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    /// Spatial reference of the collection, defaulting to WGS84.
    #[must_use]
    pub fn spatial_reference(&self) -> SpatialReference {
        self.spatial_reference.unwrap_or_default()
    }
}

/// Spatial reference, identified by its well-known ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    /// Well-known ID (e.g. 4326, 3857).
    pub wkid: u32,
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self { wkid: DEFAULT_WKID }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    /// Minimum x (west).
    pub xmin: f64,
    /// Minimum y (south).
    pub ymin: f64,
    /// Maximum x (east).
    pub xmax: f64,
    /// Maximum y (north).
    pub ymax: f64,
    /// Spatial reference of the coordinates, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<SpatialReference>,
}

impl Extent {
    /// Creates an extent with no spatial reference.
    #[must_use]
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            spatial_reference: None,
        }
    }

    /// Returns the smallest extent covering both `self` and `other`.
    ///
    /// Keeps `self`'s spatial reference.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
            spatial_reference: self.spatial_reference,
        }
    }

    /// Returns a copy tagged with the given spatial reference.
    #[must_use]
    pub const fn with_spatial_reference(mut self, spatial_reference: SpatialReference) -> Self {
        self.spatial_reference = Some(spatial_reference);
        self
    }

    /// Converts to a [`geo::Rect`]. Min/max are normalized by `geo`.
    #[must_use]
    pub fn to_rect(&self) -> geo::Rect<f64> {
        geo::Rect::new(
            geo::coord! { x: self.xmin, y: self.ymin },
            geo::coord! { x: self.xmax, y: self.ymax },
        )
    }
}

impl From<[f64; 4]> for Extent {
    fn from([xmin, ymin, xmax, ymax]: [f64; 4]) -> Self {
        Self::new(xmin, ymin, xmax, ymax)
    }
}

impl From<geo::Rect<f64>> for Extent {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Protocol geometry type tags.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum GeometryType {
    /// Single point.
    #[serde(rename = "esriGeometryPoint")]
    #[strum(serialize = "esriGeometryPoint")]
    Point,
    /// Set of points.
    #[serde(rename = "esriGeometryMultipoint")]
    #[strum(serialize = "esriGeometryMultipoint")]
    Multipoint,
    /// One or more paths.
    #[serde(rename = "esriGeometryPolyline")]
    #[strum(serialize = "esriGeometryPolyline")]
    Polyline,
    /// One or more rings.
    #[serde(rename = "esriGeometryPolygon")]
    #[strum(serialize = "esriGeometryPolygon")]
    Polygon,
    /// Axis-aligned rectangle.
    #[serde(rename = "esriGeometryEnvelope")]
    #[strum(serialize = "esriGeometryEnvelope")]
    Envelope,
}

impl GeometryType {
    /// Maps a `geo` geometry to its protocol tag.
    ///
    /// Geometry collections take the tag of their first member and fall back
    /// to [`GeometryType::Point`] when empty.
    #[must_use]
    pub fn of(geometry: &geo::Geometry<f64>) -> Self {
        match geometry {
            geo::Geometry::Point(_) => Self::Point,
            geo::Geometry::MultiPoint(_) => Self::Multipoint,
            geo::Geometry::Line(_)
            | geo::Geometry::LineString(_)
            | geo::Geometry::MultiLineString(_) => Self::Polyline,
            geo::Geometry::Polygon(_)
            | geo::Geometry::MultiPolygon(_)
            | geo::Geometry::Triangle(_) => Self::Polygon,
            geo::Geometry::Rect(_) => Self::Envelope,
            geo::Geometry::GeometryCollection(collection) => {
                collection.0.first().map_or(Self::Point, Self::of)
            }
        }
    }
}

/// Protocol field type tags.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum FieldType {
    /// Free text.
    #[serde(rename = "esriFieldTypeString")]
    #[strum(serialize = "esriFieldTypeString")]
    String,
    /// Whole number.
    #[serde(rename = "esriFieldTypeInteger")]
    #[strum(serialize = "esriFieldTypeInteger")]
    Integer,
    /// Floating point number.
    #[serde(rename = "esriFieldTypeDouble")]
    #[strum(serialize = "esriFieldTypeDouble")]
    Double,
    /// Timestamp (epoch milliseconds on the wire).
    #[serde(rename = "esriFieldTypeDate")]
    #[strum(serialize = "esriFieldTypeDate")]
    Date,
}

/// Describes one attribute field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name as it appears in feature attributes.
    pub name: String,
    /// Display alias. Defaults to the name.
    pub alias: String,
    /// Protocol field type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    /// Creates a descriptor whose alias is the field name.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            field_type,
        }
    }
}

/// Aggregate functions available to `outStatistics`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatisticType {
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Sum of values.
    Sum,
    /// Arithmetic mean.
    Avg,
    /// Number of features.
    Count,
    /// Population variance.
    Var,
    /// Population standard deviation.
    Stddev,
}

impl TryFrom<String> for StatisticType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|_| format!("unknown statistic type '{value}'"))
    }
}

/// One requested aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticSpec {
    /// Aggregate function.
    pub statistic_type: StatisticType,
    /// Attribute the aggregate is computed over.
    pub on_statistic_field: String,
    /// Name of the output attribute. Derived from the field and function when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_statistic_field_name: Option<String>,
}

impl StatisticSpec {
    /// Name of the attribute this aggregate is written to.
    #[must_use]
    pub fn output_name(&self) -> String {
        self.out_statistic_field_name.clone().unwrap_or_else(|| {
            format!(
                "{}_{}",
                self.on_statistic_field,
                self.statistic_type.as_ref().to_uppercase()
            )
        })
    }
}

/// Caller-supplied metadata substitutions for info documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    /// Replacement layer name.
    pub name: Option<String>,
    /// Replacement layer description.
    pub description: Option<String>,
}

impl Overrides {
    /// Fills any unset values from `fallback`.
    #[must_use]
    pub fn or(self, fallback: &Self) -> Self {
        Self {
            name: self.name.or_else(|| fallback.name.clone()),
            description: self.description.or_else(|| fallback.description.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_javascript_date_strings() {
        let dt = parse_date("Wed Jun 24 2015 08:18:24").unwrap();
        assert_eq!(dt.to_string(), "2015-06-24 08:18:24 UTC");

        let dt = parse_date("Wed Jun 24 2015 08:18:24 GMT-0400 (EDT)").unwrap();
        assert_eq!(dt.to_string(), "2015-06-24 08:18:24 UTC");
    }

    #[test]
    fn parses_iso_dates() {
        assert!(parse_date("2024-01-15T14:30:00.000").is_some());
        assert!(parse_date("2024-01-15T14:30:00Z").is_some());
        assert!(parse_date("2024-01-15").is_some());
    }

    #[test]
    fn rejects_non_dates() {
        assert!(parse_date("Awesome").is_none());
        assert!(parse_date("39.9137").is_none());
        assert!(parse_date("2015").is_none());
    }

    #[test]
    fn json_numbers_keep_integer_distinction() {
        assert_eq!(
            AttributeValue::from_json(&serde_json::json!(10)),
            AttributeValue::Integer(10)
        );
        assert_eq!(
            AttributeValue::from_json(&serde_json::json!(10.1)),
            AttributeValue::Double(10.1)
        );
    }

    #[test]
    fn dates_serialize_as_epoch_millis() {
        let value = AttributeValue::from_json(&serde_json::json!("2015-06-24T00:00:00Z"));
        assert_eq!(serde_json::to_value(&value).unwrap(), serde_json::json!(1_435_104_000_000_i64));
    }

    #[test]
    fn statistic_type_is_case_insensitive() {
        let spec: StatisticSpec = serde_json::from_value(serde_json::json!({
            "statisticType": "STDDEV",
            "onStatisticField": "total precip",
            "outStatisticFieldName": "sd"
        }))
        .unwrap();
        assert_eq!(spec.statistic_type, StatisticType::Stddev);
        assert_eq!(spec.output_name(), "sd");
    }

    #[test]
    fn statistic_output_name_defaults_from_field() {
        let spec = StatisticSpec {
            statistic_type: StatisticType::Count,
            on_statistic_field: "precip".to_string(),
            out_statistic_field_name: None,
        };
        assert_eq!(spec.output_name(), "precip_COUNT");
    }

    #[test]
    fn identifier_falls_back_to_object_id() {
        let feature = Feature {
            object_id: 7,
            geometry: None,
            attributes: Attributes::new(),
        };
        assert_eq!(feature.identifier("id"), AttributeValue::Integer(7));
    }

    #[test]
    fn value_resolves_the_identifier_field() {
        let mut attributes = Attributes::new();
        attributes.insert("station".to_string(), AttributeValue::from("KDEN"));
        let feature = Feature {
            object_id: 7,
            geometry: None,
            attributes,
        };

        assert_eq!(feature.value("id", "id"), Some(AttributeValue::Integer(7)));
        assert_eq!(feature.value("id", "station"), None);
        assert_eq!(
            feature.value("station", "station"),
            Some(AttributeValue::from("KDEN"))
        );
        assert_eq!(feature.value("missing", "id"), None);
    }

    #[test]
    fn geometry_type_tags_match_protocol_names() {
        assert_eq!(GeometryType::Polygon.to_string(), "esriGeometryPolygon");
        assert_eq!(
            "esriGeometryEnvelope".parse::<GeometryType>().unwrap(),
            GeometryType::Envelope
        );
        assert_eq!(FieldType::Double.as_ref(), "esriFieldTypeDouble");
    }
}
