//! Service directory and evacuation point records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of emergency service.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ServiceCategory {
    /// Fire brigade.
    #[serde(rename = "Fire Brigade")]
    FireBrigade,
    /// Police.
    Police,
    /// Hospital.
    Hospital,
    /// Ambulance depot.
    Ambulance,
    /// Water supply authority.
    #[serde(rename = "Water Supply")]
    WaterSupply,
    /// Transportation authority.
    Transportation,
    /// Health center.
    #[serde(rename = "Health Center")]
    HealthCenter,
    /// Disaster response hub.
    #[serde(rename = "Disaster Response")]
    DisasterResponse,
}

impl ServiceCategory {
    /// Human-readable label (identical to the wire name).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FireBrigade => "Fire Brigade",
            Self::Police => "Police",
            Self::Hospital => "Hospital",
            Self::Ambulance => "Ambulance",
            Self::WaterSupply => "Water Supply",
            Self::Transportation => "Transportation",
            Self::HealthCenter => "Health Center",
            Self::DisasterResponse => "Disaster Response",
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operational state of a service.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// Fully available.
    Operational,
    /// Reduced capacity.
    Limited,
    /// Unavailable.
    Offline,
}

/// Geographic position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Emergency service directory entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntity {
    /// Record id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Service kind.
    pub category: ServiceCategory,
    /// Street address.
    pub address: String,
    /// Contact phone.
    pub phone: String,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Location.
    pub coordinates: Coordinates,
    /// Free-form capacity, e.g. "12 Trucks".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    /// Staff headcount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personnel_count: Option<u32>,
    /// Notable equipment.
    #[serde(default)]
    pub special_equipment: Vec<String>,
    /// Current state.
    pub status: ServiceStatus,
    /// Last time the record changed.
    pub last_updated: DateTime<Utc>,
}

/// Kind of evacuation point.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum PointKind {
    /// Open-air gathering area.
    #[serde(rename = "Assembly Point")]
    AssemblyPoint,
    /// Covered shelter.
    Shelter,
    /// Field medical station.
    #[serde(rename = "Medical Outpost")]
    MedicalOutpost,
}

/// Safety state of an evacuation point.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum PointStatus {
    /// Accepting evacuees.
    Safe,
    /// Unsafe; do not route civilians.
    Compromised,
    /// At capacity.
    Full,
}

/// Relative position on the schematic map, as CSS percentages.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MapPosition {
    /// Offset from the top edge.
    pub top: String,
    /// Offset from the left edge.
    pub left: String,
}

/// Evacuation route endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationPoint {
    /// Record id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Point kind.
    #[serde(rename = "type")]
    pub kind: PointKind,
    /// Street address.
    pub address: String,
    /// Maximum occupancy.
    pub capacity: u32,
    /// Current occupancy.
    pub current_occupancy: u32,
    /// Safety state.
    pub status: PointStatus,
    /// Operator notes.
    pub notes: String,
    /// Position on the schematic map.
    pub map_position: MapPosition,
}
