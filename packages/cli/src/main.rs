#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the feature server query engine.
//!
//! Loads a `GeoJSON` file, runs one operation against it and prints the
//! resulting document as JSON. Query parameters are given as `key=value`
//! pairs, exactly as they would appear in a URL query string:
//!
//! ```text
//! feature_server_cli query stations.geojson 'where=total precip > 0' outFields=station
//! ```
//!
//! Failures are printed as `{"error": {"code", "message"}}` and exit non-zero.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use feature_server::{FeatureService, LoadError, QueryError, QueryParameters, server_info};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ServiceConfig, parse_config_toml};

#[derive(Parser)]
#[command(name = "feature_server_cli", about = "FeatureServer queries over GeoJSON files")]
struct Cli {
    /// TOML file with default layer name, description and identifier field
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a layer
    Query(LayerArgs),
    /// Describe a layer
    Info(LayerArgs),
    /// Describe every layer of a service
    Layers(ServiceArgs),
    /// Describe a service and list its layers
    Service {
        /// `GeoJSON` file: a `FeatureCollection` or an array of them
        data: PathBuf,
    },
    /// Print the server `rest/info` document
    ServerInfo,
}

#[derive(Args)]
struct LayerArgs {
    /// `GeoJSON` file: a `FeatureCollection` or an array of them
    data: PathBuf,
    /// Layer index
    #[arg(long, default_value = "0")]
    layer: usize,
    /// Query parameters as `key=value` pairs (e.g. `returnCountOnly=true`)
    #[arg(value_parser = parse_pair)]
    params: Vec<(String, String)>,
}

#[derive(Args)]
struct ServiceArgs {
    /// `GeoJSON` file: a `FeatureCollection` or an array of them
    data: PathBuf,
    /// Query parameters as `key=value` pairs (e.g. `overrides={"name":"x"}`)
    #[arg(value_parser = parse_pair)]
    params: Vec<(String, String)>,
}

/// Errors the CLI can report.
#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Query(QueryError),
    #[error(transparent)]
    Info(QueryError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// HTTP-style status code reported for the error.
    const fn code(&self) -> u16 {
        match self {
            Self::Query(QueryError::LayerNotFound { .. })
            | Self::Info(QueryError::LayerNotFound { .. }) => 404,
            Self::Query(_) => 400,
            Self::Info(_) | Self::Io { .. } | Self::Config(_) | Self::Load(_) | Self::Json(_) => {
                500
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

#[derive(Serialize)]
struct ErrorDocument {
    error: ErrorBody,
}

/// Parses a single `key=value` argument. The value may itself contain `=`.
fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_service(path: &Path) -> Result<FeatureService, CliError> {
    log::info!("Loading {}", path.display());
    let service = FeatureService::from_geojson_str(&read(path)?)?;
    log::info!("Loaded {} layer(s)", service.layers.len());
    Ok(service)
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig, CliError> {
    path.map_or_else(
        || Ok(ServiceConfig::default()),
        |path| Ok(parse_config_toml(&read(path)?)?),
    )
}

fn run(cli: Cli) -> Result<serde_json::Value, CliError> {
    let config = load_config(cli.config.as_deref())?;
    let params = |pairs: Vec<(String, String)>| config.apply(QueryParameters::from_pairs(pairs));

    let document = match cli.command {
        Commands::Query(args) => {
            let service = load_service(&args.data)?;
            let result = service
                .query(args.layer, &params(args.params))
                .map_err(CliError::Query)?;
            serde_json::to_value(result)?
        }
        Commands::Info(args) => {
            let service = load_service(&args.data)?;
            let layer = service.layer(args.layer).map_err(CliError::Info)?;
            let info = feature_server::describe(layer, args.layer, &params(args.params))
                .map_err(CliError::Info)?;
            serde_json::to_value(info)?
        }
        Commands::Layers(args) => {
            let service = load_service(&args.data)?;
            let layers = service
                .layers(&params(args.params))
                .map_err(CliError::Info)?;
            serde_json::to_value(layers)?
        }
        Commands::Service { data } => serde_json::to_value(load_service(&data)?.describe())?,
        Commands::ServerInfo => serde_json::to_value(server_info())?,
    };

    Ok(document)
}

fn main() -> ExitCode {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let output = run(cli)
        .and_then(|document| serde_json::to_string_pretty(&document).map_err(CliError::from));

    match output {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            let document = ErrorDocument {
                error: ErrorBody {
                    code: e.code(),
                    message: e.to_string(),
                },
            };
            match serde_json::to_string_pretty(&document) {
                Ok(output) => println!("{output}"),
                Err(e) => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        assert_eq!(
            parse_pair("where=latitude > 39").unwrap(),
            ("where".to_string(), "latitude > 39".to_string())
        );
        assert_eq!(
            parse_pair("where=1=1").unwrap(),
            ("where".to_string(), "1=1".to_string())
        );
        assert_eq!(
            parse_pair("outFields=").unwrap(),
            ("outFields".to_string(), String::new())
        );
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(parse_pair("returnCountOnly").is_err());
        assert!(parse_pair("=true").is_err());
    }

    #[test]
    fn parses_command_line() {
        let cli = Cli::try_parse_from([
            "feature_server_cli",
            "query",
            "stations.geojson",
            "--layer",
            "1",
            "returnCountOnly=true",
            "where=1=1",
        ])
        .unwrap();

        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.layer, 1);
        assert_eq!(args.params.len(), 2);
        assert_eq!(args.data, PathBuf::from("stations.geojson"));
    }

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(CliError::Query(QueryError::NoData).code(), 400);
        assert_eq!(
            CliError::Query(QueryError::InvalidStatistics {
                message: String::new()
            })
            .code(),
            400
        );
        assert_eq!(
            CliError::Info(QueryError::LayerNotFound { index: 2 }).code(),
            404
        );
        assert_eq!(CliError::Info(QueryError::NoData).code(), 500);
    }

    #[test]
    fn server_info_needs_no_data() {
        let cli = Cli::try_parse_from(["feature_server_cli", "server-info"]).unwrap();
        let document = run(cli).unwrap();
        assert_eq!(document["fullVersion"], "10.2.1");
    }
}
