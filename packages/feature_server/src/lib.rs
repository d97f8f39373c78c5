#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory `FeatureServer` query engine.
//!
//! Answers `FeatureServer`-style queries (`where`, `objectIds`, envelope
//! filters, `outStatistics`, count/ID-only responses) against a
//! [`FeatureCollection`] held in memory. Every call is a pure function of the
//! collection and the parsed [`QueryParameters`]: nothing is cached, mutated,
//! or read from disk. Routing, JSONP wrapping and transport status codes are
//! left to the caller.

pub mod envelope;
pub mod esri;
pub mod field_type;
pub mod filter;
pub mod info;
pub mod load;
pub mod params;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod service;
pub mod statistics;

pub use feature_server_models::{
    AttributeValue, Attributes, Extent, Feature, FeatureCollection, FieldDescriptor, FieldType,
    GeometryType, Overrides, ResultDocument, ServiceInfo, SpatialReference, StatisticSpec,
    StatisticType,
};
pub use info::{ExtentStore, NoExtentStore, describe, describe_with_store, server_info};
pub use load::{LoadError, parse_collection, parse_service};
pub use params::QueryParameters;
pub use query::query;
pub use service::FeatureService;

use thiserror::Error;

/// Errors a query or info call can fail with.
///
/// None of these are transient; retrying with the same inputs fails the same
/// way.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The collection has no features.
    #[error("No data found")]
    NoData,

    /// `outStatistics` was not a non-empty array of statistic definitions.
    #[error("Invalid outStatistics: {message}")]
    InvalidStatistics {
        /// Description of what went wrong.
        message: String,
    },

    /// The `where` clause is outside the supported grammar.
    #[error("Unsupported where clause: {message}")]
    UnsupportedPredicate {
        /// Description of what went wrong.
        message: String,
    },

    /// The query geometry is not an envelope, or is malformed.
    #[error("Unsupported geometry: {message}")]
    UnsupportedGeometry {
        /// Description of what went wrong.
        message: String,
    },

    /// A layer index past the end of the service was requested.
    #[error("Layer not found: {index}")]
    LayerNotFound {
        /// The requested layer index.
        index: usize,
    },
}
