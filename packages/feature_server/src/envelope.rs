//! Spatial envelope filter.
//!
//! Only `esriGeometryEnvelope` query geometries are supported. The envelope
//! is compared against feature geometries in whatever coordinates both are
//! given in; no reprojection happens.

use feature_server_models::{Extent, Feature, GeometryType, SpatialReference};
use geo::{BoundingRect, Intersects};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::QueryError;
use crate::params::QueryParameters;

/// How a feature geometry is tested against the query envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum SpatialRelation {
    /// The feature geometry touches or overlaps the envelope.
    #[default]
    #[strum(
        serialize = "esriSpatialRelIntersects",
        serialize = "esriSpatialRelEnvelopeIntersects"
    )]
    Intersects,
    /// The envelope fully contains the feature geometry.
    #[strum(serialize = "esriSpatialRelContains", serialize = "esriSpatialRelWithin")]
    Contains,
}

/// Object form of the `geometry` parameter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeJson {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
}

/// Parsed envelope filter.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeFilter {
    /// Query envelope.
    pub envelope: Extent,
    /// Spatial relation to test.
    pub relation: SpatialRelation,
}

impl EnvelopeFilter {
    /// Builds the filter from the `geometry`, `geometryType` and `spatialRel`
    /// parameters. Returns `None` when no geometry was supplied.
    ///
    /// A missing `geometryType` is treated as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedGeometry`] for non-envelope geometry
    /// types, unknown spatial relations, or malformed envelopes.
    pub fn from_params(params: &QueryParameters) -> Result<Option<Self>, QueryError> {
        let Some(geometry) = &params.geometry else {
            return Ok(None);
        };

        if let Some(geometry_type) = &params.geometry_type {
            let parsed = geometry_type.parse::<GeometryType>().ok();
            if parsed != Some(GeometryType::Envelope) {
                return Err(QueryError::UnsupportedGeometry {
                    message: format!("geometry type '{geometry_type}' is not supported"),
                });
            }
        }

        let relation = match &params.spatial_rel {
            Some(rel) => rel
                .parse::<SpatialRelation>()
                .map_err(|_| QueryError::UnsupportedGeometry {
                    message: format!("spatial relation '{rel}' is not supported"),
                })?,
            None => SpatialRelation::default(),
        };

        Ok(Some(Self {
            envelope: parse_envelope(geometry)?,
            relation,
        }))
    }

    /// Returns `true` if the feature passes the filter. Features without a
    /// geometry never pass.
    #[must_use]
    pub fn matches(&self, feature: &Feature) -> bool {
        let Some(geometry) = &feature.geometry else {
            return false;
        };
        let rect = self.envelope.to_rect();

        match self.relation {
            SpatialRelation::Intersects => {
                let disjoint_bounds = geometry
                    .bounding_rect()
                    .is_none_or(|bounds| !bounds.intersects(&rect));
                !disjoint_bounds && geometry.intersects(&geo::Geometry::Rect(rect))
            }
            SpatialRelation::Contains => geometry
                .bounding_rect()
                .is_some_and(|bounds| covers(&rect, &bounds)),
        }
    }

    /// Spatial reference the envelope was given in, if it declared one.
    #[must_use]
    pub const fn spatial_reference(&self) -> Option<SpatialReference> {
        self.envelope.spatial_reference
    }
}

/// Closed-interval containment of one rectangle in another. A geometry lies
/// inside an axis-aligned envelope exactly when its bounding box does; points
/// on the envelope edge count as contained.
fn covers(outer: &geo::Rect<f64>, inner: &geo::Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

/// Parses `"xmin,ymin,xmax,ymax"` or `{xmin, ymin, xmax, ymax, spatialReference}`.
fn parse_envelope(geometry: &serde_json::Value) -> Result<Extent, QueryError> {
    let malformed = |detail: String| QueryError::UnsupportedGeometry {
        message: format!("malformed envelope: {detail}"),
    };

    let extent = match geometry {
        serde_json::Value::String(s) => {
            let parts = s
                .split(',')
                .map(|p| p.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| malformed(format!("'{s}': {e}")))?;
            let [xmin, ymin, xmax, ymax] = parts[..] else {
                return Err(malformed(format!("'{s}' does not have four coordinates")));
            };
            Extent::new(xmin, ymin, xmax, ymax)
        }
        serde_json::Value::Object(_) => {
            let json: EnvelopeJson = serde_json::from_value(geometry.clone())
                .map_err(|e| malformed(e.to_string()))?;
            Extent {
                xmin: json.xmin,
                ymin: json.ymin,
                xmax: json.xmax,
                ymax: json.ymax,
                spatial_reference: json.spatial_reference,
            }
        }
        other => return Err(malformed(format!("unexpected value {other}"))),
    };

    if [extent.xmin, extent.ymin, extent.xmax, extent.ymax]
        .iter()
        .any(|c| !c.is_finite())
    {
        return Err(malformed("coordinates must be finite".to_string()));
    }

    Ok(extent)
}
