//! Emergency service directory and evacuation points.
//!
//! Records come from a [`DataProvider`]: the bundled fixtures, or a REST
//! backend with a configurable fallback policy.

pub mod errors;
pub mod provider;
pub mod types;

use serde::{Deserialize, Serialize};

pub use errors::{DataError, DataResult};
pub use provider::{
    DataFuture, DataProvider, DirectorySnapshot, HttpDataProvider, MockDataProvider,
    build_provider, fixture_evacuation_points, fixture_services, load_directory,
};
pub use types::{
    Coordinates, EvacuationPoint, MapPosition, PointKind, PointStatus, ServiceCategory,
    ServiceEntity, ServiceStatus,
};

/// Connection state of the directory data source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Load in progress.
    #[default]
    Connecting,
    /// Records loaded.
    Connected,
    /// Load failed.
    Error,
}
