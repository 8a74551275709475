//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::influx::ServiceStatus;
use crate::line_protocol::RejectedPoint;
use crate::response::{DeviceSnapshot, ResultRow};

// ============================================
// WRITE DTOs
// ============================================

/// Generic write response
#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub ok: bool,
    /// Lines sent to the database
    pub written: usize,
    pub bucket: String,
    /// Points dropped before writing
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedDto>,
}

/// A dropped point and the reason
#[derive(Debug, Serialize)]
pub struct RejectedDto {
    pub index: usize,
    pub error: String,
}

impl From<RejectedPoint> for RejectedDto {
    fn from(rejected: RejectedPoint) -> Self {
        Self {
            index: rejected.index,
            error: rejected.error.to_string(),
        }
    }
}

// ============================================
// QUERY DTOs
// ============================================

/// Query parameters of GET /api/influx/currents
#[derive(Debug, Default, Deserialize)]
pub struct CurrentsParams {
    /// Relative range such as `-15m`
    pub range: Option<String>,
    /// Absolute instant; wins over `range`
    pub at: Option<String>,
}

/// One current-like reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentRow {
    pub time: Option<String>,
    pub measurement: Option<String>,
    pub field: Option<String>,
    /// `null` when the cell is not a finite number
    pub value: Option<f64>,
    pub ksave: Option<String>,
    pub device: Option<String>,
    pub location: Option<String>,
}

impl From<&ResultRow> for CurrentRow {
    fn from(row: &ResultRow) -> Self {
        let text = |column: &str| row.non_empty(column).map(str::to_string);
        Self {
            time: text("_time"),
            measurement: text("_measurement"),
            field: text("_field"),
            value: row
                .non_empty("_value")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite()),
            ksave: text("ksave"),
            device: text("device"),
            location: text("location"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentsResponse {
    pub ok: bool,
    pub rows: Vec<CurrentRow>,
}

/// Known tag values
#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub ok: bool,
    pub locations: Vec<String>,
    pub ids: Vec<String>,
}

/// Query parameters of GET /api/influx/device
#[derive(Debug, Default, Deserialize)]
pub struct DeviceParams {
    pub id: Option<String>,
}

/// Device lookup result: the raw database output plus what could be read from it
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub ok: bool,
    pub id: String,
    pub raw: String,
    pub parsed: DeviceSnapshot,
}

// ============================================
// ADMIN DTOs
// ============================================

/// Machine registration request
#[derive(Debug, Default, Deserialize)]
pub struct MachineRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ksave: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A registered machine
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub ksave: String,
    pub location: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct MachineResponse {
    pub ok: bool,
    pub machine: Machine,
    pub written: usize,
}

/// Demo seed result
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub ok: bool,
    /// Machines seeded
    pub written: usize,
    pub bucket: String,
}

// ============================================
// STATUS DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct Services {
    pub influx: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grafana: Option<ServiceStatus>,
}

/// Upstream service status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub services: Services,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub influx: String,
    pub uptime_seconds: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::parse_table;

    #[test]
    fn test_current_row_from_result_row() {
        let rows = parse_table(
            ",_time,_measurement,_field,_value,ksave,device,location\n,2024-01-15T10:00:00Z,machines,ia,1.5,,Ksave01,\n,t,m,ib,NaN,k,d,l\n",
        );

        let row = CurrentRow::from(&rows[0]);
        assert_eq!(row.value, Some(1.5));
        assert_eq!(row.ksave, None);
        assert_eq!(row.device.as_deref(), Some("Ksave01"));
        assert_eq!(row.location, None);

        let json = serde_json::to_value(&row).unwrap();
        assert!(json["ksave"].is_null());
        assert_eq!(json["field"], "ia");

        assert_eq!(CurrentRow::from(&rows[1]).value, None);
    }

    #[test]
    fn test_machine_serializes_camel_case() {
        let machine = Machine {
            id: "m-1".to_string(),
            name: "KSave01".to_string(),
            ksave: "Ksave01".to_string(),
            location: None,
            created_at: "2024-01-15T10:00:00.000Z".to_string(),
        };
        let json = serde_json::to_value(&machine).unwrap();
        assert_eq!(json["createdAt"], "2024-01-15T10:00:00.000Z");
        assert!(json["location"].is_null());
    }
}
