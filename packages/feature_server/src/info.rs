//! Layer and server metadata documents.

use feature_server_models::{
    AuthInfo, CURRENT_VERSION, Extent, FeatureCollection, FieldType, GeometryType,
    MAX_RECORD_COUNT, ServerInfo, ServiceInfo,
};
use geo::BoundingRect;

use crate::QueryError;
use crate::params::QueryParameters;
use crate::schema::fields;

/// Operations advertised by every layer.
pub const CAPABILITIES: &str = "Query";

/// Layer type reported by every layer.
pub const LAYER_TYPE: &str = "Feature Layer";

/// Extent used when no feature has a geometry.
const WORLD_EXTENT: Extent = Extent::new(-180.0, -90.0, 180.0, 90.0);

/// Source of previously computed layer extents.
///
/// Lets a host that already knows a layer's bounding box (e.g. from a cache)
/// spare [`describe_with_store`] the scan over every feature geometry.
pub trait ExtentStore {
    /// Stored extent of the layer at `layer_index`, if known.
    fn extent(&self, layer_index: usize) -> Option<Extent>;
}

/// A store that knows nothing, used by [`describe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtentStore;

impl ExtentStore for NoExtentStore {
    fn extent(&self, _layer_index: usize) -> Option<Extent> {
        None
    }
}

impl<F> ExtentStore for F
where
    F: Fn(usize) -> Option<Extent>,
{
    fn extent(&self, layer_index: usize) -> Option<Extent> {
        self(layer_index)
    }
}

/// Builds the metadata document of one layer.
///
/// # Errors
///
/// Returns [`QueryError::NoData`] if the collection has no features.
pub fn describe(
    collection: &FeatureCollection,
    layer_index: usize,
    params: &QueryParameters,
) -> Result<ServiceInfo, QueryError> {
    describe_with_store(collection, layer_index, params, &NoExtentStore)
}

/// Like [`describe`], consulting `store` for the extent when the collection
/// doesn't carry one.
///
/// Name and description come from the `overrides` parameter, then the
/// collection's own metadata, then defaults.
///
/// # Errors
///
/// Returns [`QueryError::NoData`] if the collection has no features.
pub fn describe_with_store(
    collection: &FeatureCollection,
    layer_index: usize,
    params: &QueryParameters,
    store: &dyn ExtentStore,
) -> Result<ServiceInfo, QueryError> {
    let first = collection.features.first().ok_or(QueryError::NoData)?;

    let schema = fields(&first.attributes, params.id_field.as_deref());
    let spatial_reference = collection.spatial_reference();

    let geometry_type = collection.geometry_type.or_else(|| {
        collection
            .features
            .iter()
            .find_map(|f| f.geometry.as_ref())
            .map(GeometryType::of)
    });

    let extent = collection
        .extent
        .or_else(|| store.extent(layer_index))
        .or_else(|| compute_extent(collection))
        .unwrap_or(WORLD_EXTENT)
        .with_spatial_reference(spatial_reference);

    let display_field = schema
        .fields
        .iter()
        .find(|f| f.field_type == FieldType::String)
        .map_or_else(|| schema.oid_field.clone(), |f| f.name.clone());

    let name = params
        .overrides
        .name
        .clone()
        .or_else(|| collection.name.clone())
        .unwrap_or_else(|| format!("Layer {layer_index}"));
    let description = params
        .overrides
        .description
        .clone()
        .or_else(|| collection.description.clone())
        .unwrap_or_default();

    Ok(ServiceInfo {
        current_version: CURRENT_VERSION,
        id: layer_index,
        name,
        layer_type: LAYER_TYPE.to_string(),
        description,
        geometry_type,
        spatial_reference,
        extent,
        full_extent: extent,
        object_id_field: schema.oid_field,
        display_field,
        fields: schema.fields,
        max_record_count: MAX_RECORD_COUNT,
        capabilities: CAPABILITIES.to_string(),
        supports_statistics: true,
    })
}

/// Union of every feature's bounding box. `None` when no feature has a
/// geometry.
#[must_use]
pub fn compute_extent(collection: &FeatureCollection) -> Option<Extent> {
    collection
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref()?.bounding_rect())
        .map(Extent::from)
        .reduce(|acc, extent| acc.union(&extent))
}

/// The server's `rest/info` document.
#[must_use]
pub fn server_info() -> ServerInfo {
    ServerInfo {
        current_version: CURRENT_VERSION,
        full_version: "10.2.1".to_string(),
        soap_url: "http://sampleserver6.arcgisonline.com/arcgis/services".to_string(),
        secure_soap_url: "https://sampleserver6.arcgisonline.com/arcgis/services".to_string(),
        auth_info: AuthInfo {
            is_token_based_security: true,
            token_services_url: "https://sampleserver6.arcgisonline.com/arcgis/tokens/"
                .to_string(),
            short_lived_token_validity: 60,
        },
    }
}
