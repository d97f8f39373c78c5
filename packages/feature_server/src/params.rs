//! Query parameter parsing.
//!
//! Parameters arrive as a flat JSON object, either straight from a URL query
//! string (every value a string) or from a JSON body (native booleans,
//! numbers, nested objects). Both forms are accepted. Unknown keys are
//! ignored and missing keys take their defaults.

use feature_server_models::Overrides;

/// Attribute projection requested through `outFields`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutFields {
    /// `*` or no `outFields` at all.
    #[default]
    All,
    /// Only these attributes, in request order.
    Only(Vec<String>),
}

impl OutFields {
    /// Returns `true` if the attribute `name` should be kept.
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Parsed query parameters. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameters {
    /// `objectIds`: identifiers to keep.
    pub object_ids: Option<Vec<String>>,
    /// `where`: attribute predicate text.
    pub where_clause: Option<String>,
    /// `geometry`: raw envelope, either `"xmin,ymin,xmax,ymax"` or an object.
    pub geometry: Option<serde_json::Value>,
    /// `geometryType`
    pub geometry_type: Option<String>,
    /// `spatialRel`
    pub spatial_rel: Option<String>,
    /// `outFields`
    pub out_fields: OutFields,
    /// `returnGeometry` (default `true`).
    pub return_geometry: bool,
    /// `returnCountOnly` (default `false`).
    pub return_count_only: bool,
    /// `returnIdsOnly` (default `false`).
    pub return_ids_only: bool,
    /// `idField`: identifier attribute used for `objectIds` and
    /// `returnIdsOnly`.
    pub id_field: Option<String>,
    /// `outStatistics`: raw statistic definitions, validated when the query
    /// runs.
    pub out_statistics: Option<serde_json::Value>,
    /// `groupByFieldsForStatistics`
    pub group_by: Option<String>,
    /// `overrides`: metadata substitutions for info calls.
    pub overrides: Overrides,
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self {
            object_ids: None,
            where_clause: None,
            geometry: None,
            geometry_type: None,
            spatial_rel: None,
            out_fields: OutFields::All,
            return_geometry: true,
            return_count_only: false,
            return_ids_only: false,
            id_field: None,
            out_statistics: None,
            group_by: None,
            overrides: Overrides::default(),
        }
    }
}

impl QueryParameters {
    /// Parses a flat JSON object of query parameters.
    ///
    /// Anything other than an object yields the defaults.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        let get = |key: &str| map.get(key).filter(|v| !v.is_null());

        let defaults = Self::default();

        Self {
            object_ids: get("objectIds").map(list).filter(|ids| !ids.is_empty()),
            where_clause: get("where").and_then(string),
            geometry: get("geometry").and_then(geometry),
            geometry_type: get("geometryType").and_then(string),
            spatial_rel: get("spatialRel").and_then(string),
            out_fields: get("outFields").map_or(OutFields::All, out_fields),
            return_geometry: get("returnGeometry")
                .map_or(defaults.return_geometry, |v| boolean(v, defaults.return_geometry)),
            return_count_only: get("returnCountOnly").is_some_and(|v| boolean(v, false)),
            return_ids_only: get("returnIdsOnly").is_some_and(|v| boolean(v, false)),
            id_field: get("idField").and_then(string),
            out_statistics: get("outStatistics").cloned(),
            group_by: get("groupByFieldsForStatistics").and_then(string),
            overrides: get("overrides").map(overrides).unwrap_or_default(),
        }
    }

    /// Parses `key=value` pairs, as found in a URL query string.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), serde_json::Value::String(v.into())))
            .collect();
        Self::from_json(&serde_json::Value::Object(map))
    }
}

fn string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            None
        }
    }
}

fn boolean(value: &serde_json::Value, default: bool) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        },
        serde_json::Value::Number(n) => n.as_f64().map_or(default, |n| n != 0.0),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            default
        }
    }
}

fn list(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items.iter().filter_map(string).collect(),
        other => string(other)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn out_fields(value: &serde_json::Value) -> OutFields {
    let names = list(value);
    if names.is_empty() || names.iter().any(|n| n == "*") {
        OutFields::All
    } else {
        OutFields::Only(names)
    }
}

/// Envelope JSON may arrive encoded as a string; decode it so the filter
/// sees an object. Comma-separated coordinates stay a string.
fn geometry(value: &serde_json::Value) -> Option<serde_json::Value> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if s.starts_with('{') {
                serde_json::from_str(s)
                    .ok()
                    .or_else(|| Some(serde_json::Value::String(s.to_string())))
            } else {
                Some(serde_json::Value::String(s.to_string()))
            }
        }
        other => Some(other.clone()),
    }
}

fn overrides(value: &serde_json::Value) -> Overrides {
    let parsed = match value {
        serde_json::Value::String(s) => serde_json::from_str(s),
        other => serde_json::from_value(other.clone()),
    };
    parsed.unwrap_or_else(|e| {
        log::warn!("Ignoring malformed overrides: {e}");
        Overrides::default()
    })
}
