//! Protocol response documents.
//!
//! Field names follow the `FeatureServer` JSON schema, so every struct here
//! serializes with `camelCase` keys.

use serde::Serialize;

use crate::{AttributeValue, Attributes, Extent, FieldDescriptor, GeometryType, SpatialReference};

/// Protocol version reported by every info document.
pub const CURRENT_VERSION: f64 = 10.21;

/// A feature as returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFeature {
    /// Esri JSON geometry. Omitted when `returnGeometry=false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
    /// Projected attributes.
    pub attributes: Attributes,
}

/// Result of `returnCountOnly=true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountResult {
    /// Number of features that passed the filters.
    pub count: usize,
}

/// Result of `returnIdsOnly=true`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdsResult {
    /// Name of the identifier field the IDs were read from.
    pub object_id_field: String,
    /// Identifier of every surviving feature, in collection order.
    pub object_ids: Vec<AttributeValue>,
}

/// Result of a plain feature query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResult {
    /// Name of the identifier field.
    pub object_id_field_name: String,
    /// Geometry type of the layer, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<GeometryType>,
    /// Spatial reference of the returned geometries.
    pub spatial_reference: SpatialReference,
    /// Layer fields.
    pub fields: Vec<FieldDescriptor>,
    /// Matching features, capped at [`crate::MAX_RECORD_COUNT`].
    pub features: Vec<OutputFeature>,
    /// Set when matching features were dropped by the record cap.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exceeded_transfer_limit: bool,
}

/// Result of an `outStatistics` query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResult {
    /// Group-by field (if any) followed by one field per statistic.
    pub fields: Vec<FieldDescriptor>,
    /// One feature per group.
    pub features: Vec<OutputFeature>,
    /// Set when groups were dropped by the record cap.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exceeded_transfer_limit: bool,
}

/// Every shape a query can produce. Exactly one is returned per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultDocument {
    /// `returnCountOnly`
    Count(CountResult),
    /// `returnIdsOnly`
    Ids(IdsResult),
    /// Plain feature query.
    Features(FeatureResult),
    /// `outStatistics`
    Statistics(StatisticsResult),
}

impl ResultDocument {
    /// Features carried by the document, if it has any.
    #[must_use]
    pub fn features(&self) -> Option<&[OutputFeature]> {
        match self {
            Self::Features(result) => Some(&result.features),
            Self::Statistics(result) => Some(&result.features),
            Self::Count(_) | Self::Ids(_) => None,
        }
    }

    /// Fields carried by the document, if it has any.
    #[must_use]
    pub fn fields(&self) -> Option<&[FieldDescriptor]> {
        match self {
            Self::Features(result) => Some(&result.fields),
            Self::Statistics(result) => Some(&result.fields),
            Self::Count(_) | Self::Ids(_) => None,
        }
    }
}

/// Layer-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// Protocol version.
    pub current_version: f64,
    /// Layer index within the service.
    pub id: usize,
    /// Layer name.
    pub name: String,
    /// Always `"Feature Layer"`.
    #[serde(rename = "type")]
    pub layer_type: String,
    /// Layer description.
    pub description: String,
    /// Geometry type of the layer's features.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<GeometryType>,
    /// Spatial reference of the layer.
    pub spatial_reference: SpatialReference,
    /// Bounding box of the layer.
    pub extent: Extent,
    /// Same as `extent`; service-level clients read this key.
    pub full_extent: Extent,
    /// Name of the identifier field.
    pub object_id_field: String,
    /// Field shown as the feature label.
    pub display_field: String,
    /// Layer fields.
    pub fields: Vec<FieldDescriptor>,
    /// Maximum features per response.
    pub max_record_count: usize,
    /// Supported operations.
    pub capabilities: String,
    /// Whether `outStatistics` is supported.
    pub supports_statistics: bool,
}

/// Reference to a layer inside a [`ServiceDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReference {
    /// Layer index.
    pub id: usize,
    /// Layer name.
    pub name: String,
}

/// Service-level metadata (the `FeatureServer` root document).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDocument {
    /// Protocol version.
    pub current_version: f64,
    /// Service description.
    pub service_description: String,
    /// Maximum features per response.
    pub max_record_count: usize,
    /// Spatial reference of the first layer.
    pub spatial_reference: SpatialReference,
    /// Union of every layer's extent.
    pub full_extent: Option<Extent>,
    /// Supported operations.
    pub capabilities: String,
    /// Layers in the service.
    pub layers: Vec<LayerReference>,
    /// Tables in the service (always empty).
    pub tables: Vec<LayerReference>,
}

/// Response of the `/layers` operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayersDocument {
    /// Full metadata for every layer.
    pub layers: Vec<ServiceInfo>,
    /// Tables in the service (always empty).
    pub tables: Vec<ServiceInfo>,
}

/// Token authentication settings advertised by [`ServerInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    /// Whether token security is enabled.
    pub is_token_based_security: bool,
    /// URL of the token service.
    pub token_services_url: String,
    /// Lifetime of short-lived tokens, in minutes.
    pub short_lived_token_validity: u32,
}

/// The server's `rest/info` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Protocol version.
    pub current_version: f64,
    /// Dotted version string.
    pub full_version: String,
    /// SOAP endpoint.
    pub soap_url: String,
    /// SOAP endpoint over HTTPS.
    pub secure_soap_url: String,
    /// Authentication settings.
    pub auth_info: AuthInfo,
}
