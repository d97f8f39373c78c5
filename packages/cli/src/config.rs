//! Service configuration file.
//!
//! ```toml
//! name = "Weather stations"
//! description = "Hourly observations"
//! id_field = "station"
//! ```
//!
//! Every key is optional. Values act as defaults: per-call `overrides` and
//! `idField` parameters take precedence.

use feature_server::QueryParameters;
use feature_server_models::Overrides;
use serde::Deserialize;

/// Defaults applied to every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Default layer name.
    pub name: Option<String>,
    /// Default layer description.
    pub description: Option<String>,
    /// Default identifier field.
    pub id_field: Option<String>,
}

impl ServiceConfig {
    /// Metadata overrides carried by this configuration.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    /// Fills parameters the caller left unset from this configuration.
    #[must_use]
    pub fn apply(&self, params: QueryParameters) -> QueryParameters {
        QueryParameters {
            overrides: params.overrides.or(&self.overrides()),
            id_field: params.id_field.or_else(|| self.id_field.clone()),
            ..params
        }
    }
}

/// Parses a [`ServiceConfig`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or has unknown keys.
pub fn parse_config_toml(toml_str: &str) -> Result<ServiceConfig, toml::de::Error> {
    toml::de::from_str(toml_str)
}
