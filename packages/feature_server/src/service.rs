//! Multi-layer services.

use feature_server_models::{
    CURRENT_VERSION, FeatureCollection, LayerReference, LayersDocument, MAX_RECORD_COUNT,
    ResultDocument, ServiceDocument,
};

use crate::QueryError;
use crate::info::{CAPABILITIES, compute_extent, describe};
use crate::load::{LoadError, parse_service};
use crate::params::QueryParameters;
use crate::query::query;

/// An ordered list of layers, addressed by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureService {
    /// Layers, in index order.
    pub layers: Vec<FeatureCollection>,
}

impl FeatureService {
    /// Creates a service from its layers.
    #[must_use]
    pub const fn new(layers: Vec<FeatureCollection>) -> Self {
        Self { layers }
    }

    /// Parses a `GeoJSON` service document. See [`parse_service`].
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the document can't be parsed.
    pub fn from_geojson_str(input: &str) -> Result<Self, LoadError> {
        parse_service(input).map(Self::new)
    }

    /// Returns the layer at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::LayerNotFound`] if there is no such layer.
    pub fn layer(&self, index: usize) -> Result<&FeatureCollection, QueryError> {
        self.layers
            .get(index)
            .ok_or(QueryError::LayerNotFound { index })
    }

    /// Runs a query against the layer at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::LayerNotFound`] for a missing layer, or any error
    /// [`query`] returns.
    pub fn query(
        &self,
        index: usize,
        params: &QueryParameters,
    ) -> Result<ResultDocument, QueryError> {
        query(self.layer(index)?, params)
    }

    /// Builds the service-level document.
    ///
    /// The service description is the first layer's description, and the
    /// full extent is the union of every layer's extent.
    #[must_use]
    pub fn describe(&self) -> ServiceDocument {
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(id, layer)| LayerReference {
                id,
                name: layer.name.clone().unwrap_or_else(|| format!("Layer {id}")),
            })
            .collect();

        let spatial_reference = self
            .layers
            .first()
            .map(FeatureCollection::spatial_reference)
            .unwrap_or_default();

        let full_extent = self
            .layers
            .iter()
            .filter_map(|layer| layer.extent.or_else(|| compute_extent(layer)))
            .reduce(|acc, extent| acc.union(&extent))
            .map(|extent| extent.with_spatial_reference(spatial_reference));

        ServiceDocument {
            current_version: CURRENT_VERSION,
            service_description: self
                .layers
                .first()
                .and_then(|layer| layer.description.clone())
                .unwrap_or_default(),
            max_record_count: MAX_RECORD_COUNT,
            spatial_reference,
            full_extent,
            capabilities: CAPABILITIES.to_string(),
            layers,
            tables: Vec::new(),
        }
    }

    /// Describes every layer.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoData`] if any layer is empty.
    pub fn layers(&self, params: &QueryParameters) -> Result<LayersDocument, QueryError> {
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| describe(layer, index, params))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LayersDocument {
            layers,
            tables: Vec::new(),
        })
    }
}

impl From<FeatureCollection> for FeatureService {
    fn from(layer: FeatureCollection) -> Self {
        Self::new(vec![layer])
    }
}

#[cfg(test)]
mod tests {
    use feature_server_models::{AttributeValue, Attributes, Extent, Feature};
    use geo::point;

    use super::*;

    fn layer(name: &str, x: f64) -> FeatureCollection {
        let mut attributes = Attributes::new();
        attributes.insert("station".to_string(), AttributeValue::from(name));
        let mut collection = FeatureCollection::new(vec![Feature {
            object_id: 1,
            geometry: Some(point!(x: x, y: 40.0).into()),
            attributes,
        }]);
        collection.name = Some(name.to_string());
        collection
    }

    #[test]
    fn missing_layer_is_an_error() {
        let service = FeatureService::from(layer("a", 0.0));
        assert!(service.layer(0).is_ok());
        assert_eq!(service.layer(3), Err(QueryError::LayerNotFound { index: 3 }));
        assert_eq!(
            service.query(1, &QueryParameters::default()),
            Err(QueryError::LayerNotFound { index: 1 })
        );
    }

    #[test]
    fn describes_service() {
        let service = FeatureService::new(vec![layer("a", -105.0), layer("b", -100.0)]);
        let doc = service.describe();

        assert_eq!(
            doc.layers,
            vec![
                LayerReference { id: 0, name: "a".to_string() },
                LayerReference { id: 1, name: "b".to_string() },
            ]
        );
        assert_eq!(
            doc.full_extent.map(|e| (e.xmin, e.xmax)),
            Some((-105.0, -100.0))
        );
        assert!(doc.tables.is_empty());
    }

    #[test]
    fn lists_layer_metadata() {
        let service = FeatureService::new(vec![layer("a", -105.0), layer("b", -100.0)]);
        let doc = service.layers(&QueryParameters::default()).unwrap();

        assert_eq!(doc.layers.len(), 2);
        assert_eq!(doc.layers[1].id, 1);
        assert_eq!(doc.layers[1].name, "b");
    }

    #[test]
    fn empty_service_has_no_extent() {
        let doc = FeatureService::default().describe();
        assert!(doc.layers.is_empty());
        assert_eq!(doc.full_extent, None::<Extent>);
    }
}
