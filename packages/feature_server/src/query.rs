//! Query entry point: filters a collection and assembles the response
//! document.

use feature_server_models::{
    Attributes, CountResult, Feature, FeatureCollection, FeatureResult, GeometryType, IdsResult,
    MAX_RECORD_COUNT, OutputFeature, ResultDocument,
};

use crate::QueryError;
use crate::esri::to_esri_geometry;
use crate::filter::{Filtered, filter};
use crate::params::QueryParameters;
use crate::schema::fields;
use crate::statistics::{aggregate, parse_statistics};

/// Runs a query against a collection.
///
/// The response shape is picked by the first matching parameter:
/// `returnCountOnly`, then `returnIdsOnly`, then `outStatistics`, otherwise
/// a feature result. Feature and statistics results are capped at
/// [`MAX_RECORD_COUNT`] entries (the first ones, in collection order), with
/// `exceededTransferLimit` set when anything was dropped.
///
/// # Errors
///
/// * [`QueryError::NoData`] if the collection has no features
/// * [`QueryError::UnsupportedPredicate`] if the `where` clause can't be
///   parsed
/// * [`QueryError::UnsupportedGeometry`] if the query geometry is not a
///   well-formed envelope
/// * [`QueryError::InvalidStatistics`] if `outStatistics` is malformed
pub fn query(
    collection: &FeatureCollection,
    params: &QueryParameters,
) -> Result<ResultDocument, QueryError> {
    if collection.features.is_empty() {
        return Err(QueryError::NoData);
    }

    let filtered = filter(collection, params)?;

    if params.return_count_only {
        return Ok(ResultDocument::Count(CountResult {
            count: filtered.features.len(),
        }));
    }

    if params.return_ids_only {
        return Ok(ResultDocument::Ids(IdsResult {
            object_ids: filtered
                .features
                .iter()
                .map(|f| f.identifier(&filtered.oid_field))
                .collect(),
            object_id_field: filtered.oid_field,
        }));
    }

    if let Some(out_statistics) = &params.out_statistics {
        let specs = parse_statistics(out_statistics)?;
        let mut result = aggregate(
            &filtered.features,
            &specs,
            params.group_by.as_deref(),
            &filtered.oid_field,
        );
        result.exceeded_transfer_limit = result.features.len() > MAX_RECORD_COUNT;
        result.features.truncate(MAX_RECORD_COUNT);
        return Ok(ResultDocument::Statistics(result));
    }

    Ok(ResultDocument::Features(feature_result(collection, filtered, params)))
}

fn feature_result(
    collection: &FeatureCollection,
    filtered: Filtered<'_>,
    params: &QueryParameters,
) -> FeatureResult {
    let schema = fields(
        &collection.features[0].attributes,
        Some(filtered.oid_field.as_str()),
    );
    let exceeded_transfer_limit = filtered.features.len() > MAX_RECORD_COUNT;
    if exceeded_transfer_limit {
        log::debug!(
            "Truncating {} matching features to {MAX_RECORD_COUNT}",
            filtered.features.len()
        );
    }

    let features = filtered
        .features
        .iter()
        .take(MAX_RECORD_COUNT)
        .map(|feature| output_feature(feature, &schema.oid_field, params))
        .collect();

    FeatureResult {
        object_id_field_name: schema.oid_field,
        geometry_type: collection.geometry_type.or_else(|| {
            collection
                .features
                .iter()
                .find_map(|f| f.geometry.as_ref())
                .map(GeometryType::of)
        }),
        spatial_reference: collection.spatial_reference(),
        fields: schema
            .fields
            .into_iter()
            .filter(|field| params.out_fields.includes(&field.name))
            .collect(),
        features,
        exceeded_transfer_limit,
    }
}

fn output_feature(feature: &Feature, oid_field: &str, params: &QueryParameters) -> OutputFeature {
    let mut attributes: Attributes = feature
        .attributes
        .iter()
        .filter(|(name, _)| params.out_fields.includes(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    if params.out_fields.includes(oid_field) && !attributes.contains_key(oid_field) {
        attributes.insert(oid_field.to_string(), feature.identifier(oid_field));
    }

    OutputFeature {
        geometry: params
            .return_geometry
            .then(|| feature.geometry.as_ref().map(to_esri_geometry))
            .flatten(),
        attributes,
    }
}
