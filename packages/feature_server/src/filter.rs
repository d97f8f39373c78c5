//! The filter pipeline: identifier list, `where` clause, then envelope.
//!
//! Each stage runs only when its parameters are present. Surviving features
//! keep their collection order and are borrowed, never copied.

use feature_server_models::{AttributeValue, DEFAULT_OID_FIELD, Feature, FeatureCollection};

use crate::QueryError;
use crate::envelope::EnvelopeFilter;
use crate::params::QueryParameters;
use crate::predicate::Predicate;

/// Output of [`filter`].
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered<'a> {
    /// Surviving features, in collection order.
    pub features: Vec<&'a Feature>,
    /// Identifier field used for `objectIds` matching.
    pub oid_field: String,
}

/// Runs the filter pipeline over `collection`.
///
/// All filters are parsed before any feature is inspected, so malformed
/// parameters fail the same way regardless of the data.
///
/// # Errors
///
/// * [`QueryError::UnsupportedPredicate`] if the `where` clause can't be
///   parsed
/// * [`QueryError::UnsupportedGeometry`] if the query geometry is not a
///   well-formed envelope
pub fn filter<'a>(
    collection: &'a FeatureCollection,
    params: &QueryParameters,
) -> Result<Filtered<'a>, QueryError> {
    let oid_field = params
        .id_field
        .clone()
        .unwrap_or_else(|| DEFAULT_OID_FIELD.to_string());

    let predicate = params
        .where_clause
        .as_deref()
        .map(Predicate::parse)
        .transpose()?;
    let envelope = EnvelopeFilter::from_params(params)?;

    if let Some(envelope_sr) = envelope.as_ref().and_then(EnvelopeFilter::spatial_reference)
        && envelope_sr != collection.spatial_reference()
    {
        log::warn!(
            "Query envelope is in wkid {} but the collection is in wkid {}; comparing without reprojection",
            envelope_sr.wkid,
            collection.spatial_reference().wkid,
        );
    }

    let mut features: Vec<&Feature> = collection.features.iter().collect();

    if let Some(ids) = &params.object_ids {
        features.retain(|f| matches_any_id(&f.identifier(&oid_field), ids));
        log::debug!("objectIds filter: {} features remain", features.len());
    }

    if let Some(predicate) = predicate.filter(|p| *p != Predicate::Always) {
        features.retain(|f| predicate.matches(f, &oid_field));
        log::debug!("where filter: {} features remain", features.len());
    }

    if let Some(envelope) = envelope {
        features.retain(|f| envelope.matches(f));
        log::debug!(
            "{} envelope filter: {} features remain",
            envelope.relation,
            features.len()
        );
    }

    Ok(Filtered {
        features,
        oid_field,
    })
}

/// Matches an identifier against the requested IDs, numerically when both
/// sides are numbers (so `"1"` matches `1.0`), textually otherwise.
fn matches_any_id(identifier: &AttributeValue, ids: &[String]) -> bool {
    let numeric = identifier.as_f64();
    let text = identifier.to_string();

    ids.iter().any(|id| match (numeric, id.parse::<f64>()) {
        #[allow(clippy::float_cmp)]
        (Some(lhs), Ok(rhs)) => lhs == rhs,
        _ => *id == text,
    })
}
