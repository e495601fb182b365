//! Snapshot wire model and decode.
//!
//! Each WebSocket text frame carries one complete dashboard snapshot. A
//! frame either decodes and validates as a whole or is rejected as a whole;
//! there is no partial or merged application. Field names mirror the server
//! payload (camelCase, integer-coded status enums).

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Decode errors ────────────────────────────────────────────────────

/// Per-frame decode failure.
///
/// Both variants are recovered locally: the frame is dropped, the previous
/// snapshot stays authoritative, and the connection remains open.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not syntactically valid JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload is valid JSON but violates the snapshot schema:
    /// missing/mistyped fields or values outside their declared range.
    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

// ── Status enumerations ──────────────────────────────────────────────

/// Device status, integer-coded on the wire (0/1/2).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    Offline,
    Online,
    Alarming,
}

impl TryFrom<u8> for DeviceStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Offline),
            1 => Ok(Self::Online),
            2 => Ok(Self::Alarming),
            other => Err(format!("unknown device status code: {other}")),
        }
    }
}

impl From<DeviceStatus> for u8 {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Offline => 0,
            DeviceStatus::Online => 1,
            DeviceStatus::Alarming => 2,
        }
    }
}

/// Alarm severity, integer-coded on the wire (1/2/3).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "lowercase")]
pub enum AlarmLevel {
    Normal,
    Major,
    Critical,
}

impl TryFrom<u8> for AlarmLevel {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Normal),
            2 => Ok(Self::Major),
            3 => Ok(Self::Critical),
            other => Err(format!("unknown alarm level code: {other}")),
        }
    }
}

impl From<AlarmLevel> for u8 {
    fn from(level: AlarmLevel) -> Self {
        match level {
            AlarmLevel::Normal => 1,
            AlarmLevel::Major => 2,
            AlarmLevel::Critical => 3,
        }
    }
}

/// Alarm resolution status, integer-coded on the wire (0/1).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "lowercase")]
pub enum AlarmStatus {
    Unresolved,
    Resolved,
}

impl TryFrom<u8> for AlarmStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Unresolved),
            1 => Ok(Self::Resolved),
            other => Err(format!("unknown alarm status code: {other}")),
        }
    }
}

impl From<AlarmStatus> for u8 {
    fn from(status: AlarmStatus) -> Self {
        match status {
            AlarmStatus::Unresolved => 0,
            AlarmStatus::Resolved => 1,
        }
    }
}

// ── Entities ─────────────────────────────────────────────────────────

/// A project (item group) on the shop floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub item_id: String,
    pub item_name: String,
    /// Geocoordinate string, `"lng,lat"`.
    pub lnglat: String,
    pub parent_group_id: String,
    pub device_count: u32,
    pub online_count: u32,
}

/// A monitored device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub item_id: String,
    pub item_name: String,
    pub status: DeviceStatus,
}

/// A live PLC data point reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub id: String,
    pub name: String,
    pub data_type: i32,
    /// Whether the point accepts writes.
    pub set: bool,
    pub is_coil: bool,
    pub unit: String,
    /// Raw value as the PLC reports it.
    pub value: String,
    /// Display-formatted value.
    pub value_string: String,
    pub device_id: String,
    pub device_name: String,
}

/// One day of the production trend (most recent days, date ascending).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub production: u64,
    pub plan: u64,
    /// Completion percentage, `production / plan * 100` when plan > 0.
    pub rate: f64,
}

/// An alarm raised against a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub device_id: String,
    pub device_name: String,
    pub alarm_type: String,
    pub alarm_content: String,
    pub alarm_time: String,
    pub level: AlarmLevel,
    pub status: AlarmStatus,
}

// ── Snapshot ─────────────────────────────────────────────────────────

/// The complete, self-consistent picture of monitored shop-floor state at
/// one point in time.
///
/// Created only by a successful [`decode`](Snapshot::decode); never mutated
/// in place; replaced wholesale by the next successful decode. All rates
/// are pre-multiplied percentages in `[0, 100]`, as computed server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub total_devices: u32,
    pub online_devices: u32,
    pub offline_devices: u32,
    pub alarm_devices: u32,

    pub today_production: u64,
    pub plan_production: u64,
    pub production_rate: f64,

    pub equipment_efficiency: f64,
    pub quality_rate: f64,
    pub running_rate: f64,

    pub projects: Vec<Project>,
    pub devices: Vec<Device>,
    pub data_points: Vec<DataPoint>,
    pub production_trend: Vec<TrendPoint>,
    pub alarms: Vec<Alarm>,

    /// Server-assigned snapshot timestamp (epoch millis on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub update_time: DateTime<Utc>,
}

impl Snapshot {
    /// Decode one inbound frame into a validated snapshot.
    ///
    /// Two-phase: JSON syntax errors map to
    /// [`DecodeError::MalformedPayload`]; shape, type, and range errors map
    /// to [`DecodeError::SchemaViolation`]. Data points referencing a
    /// device absent from the same snapshot are dropped (logged, not an
    /// error).
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

        let mut snapshot: Self = serde_json::from_value(value)
            .map_err(|e| DecodeError::SchemaViolation(e.to_string()))?;

        snapshot.validate()?;
        snapshot.drop_orphaned_points();
        Ok(snapshot)
    }

    /// Check the cross-field invariants serde cannot express.
    fn validate(&self) -> Result<(), DecodeError> {
        if self.online_devices > self.total_devices {
            return Err(DecodeError::SchemaViolation(format!(
                "onlineDevices {} exceeds totalDevices {}",
                self.online_devices, self.total_devices
            )));
        }

        for (name, rate) in [
            ("productionRate", self.production_rate),
            ("equipmentEfficiency", self.equipment_efficiency),
            ("qualityRate", self.quality_rate),
            ("runningRate", self.running_rate),
        ] {
            if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
                return Err(DecodeError::SchemaViolation(format!(
                    "{name} {rate} outside [0, 100]"
                )));
            }
        }

        for project in &self.projects {
            if project.online_count > project.device_count {
                return Err(DecodeError::SchemaViolation(format!(
                    "project {}: onlineCount {} exceeds deviceCount {}",
                    project.item_id, project.online_count, project.device_count
                )));
            }
        }

        if let Some(pair) = self
            .production_trend
            .windows(2)
            .find(|pair| pair[0].date > pair[1].date)
        {
            return Err(DecodeError::SchemaViolation(format!(
                "productionTrend not sorted by date: {} before {}",
                pair[0].date, pair[1].date
            )));
        }

        Ok(())
    }

    /// Drop data points whose `deviceId` references no device in this
    /// snapshot.
    fn drop_orphaned_points(&mut self) {
        let known: HashSet<&str> = self.devices.iter().map(|d| d.device_id.as_str()).collect();
        let before = self.data_points.len();
        self.data_points.retain(|p| known.contains(p.device_id.as_str()));

        let dropped = before - self.data_points.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped orphaned data points");
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Look up a device by its stable identifier.
    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    /// Data points attached to the given device.
    pub fn points_for<'a>(&'a self, device_id: &'a str) -> impl Iterator<Item = &'a DataPoint> {
        self.data_points.iter().filter(move |p| p.device_id == device_id)
    }

    /// Alarms raised against the given device.
    pub fn alarms_for<'a>(&'a self, device_id: &'a str) -> impl Iterator<Item = &'a Alarm> {
        self.alarms.iter().filter(move |a| a.device_id == device_id)
    }

    /// Alarms still awaiting resolution.
    pub fn unresolved_alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms
            .iter()
            .filter(|a| a.status == AlarmStatus::Unresolved)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
