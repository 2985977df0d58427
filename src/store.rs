//! Host device store seam.
//!
//! Whenever a shade's state is (re)confirmed, the coordinator publishes a
//! [`TelemetryUpdate`] here. The host automation platform sits behind the
//! [`DeviceStore`] trait; the shipped daemon uses [`LoggingStore`], which
//! emits one JSON line per update.

use crate::error::Result;
use crate::shade::{self, DeviceId, ShadeStatus, ShadeTelemetry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

/// Host-facing view of one shade, derived from raw vendor telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryUpdate {
    pub id: DeviceId,
    pub status: ShadeStatus,
    /// Host level: 100 = fully open, 0 = fully closed (vendor complement).
    pub level: u8,
    pub battery: u8,
    /// Signal quality on the host's 0-10 scale.
    pub signal: u8,
    pub observed_at: DateTime<Utc>,
}

impl TelemetryUpdate {
    /// Apply the vendor-to-host mappings to a raw reading.
    pub fn from_telemetry(id: DeviceId, telemetry: &ShadeTelemetry) -> Self {
        Self {
            id,
            status: ShadeStatus::from_position(telemetry.position),
            level: shade::host_level(telemetry.position),
            battery: shade::battery_percent(telemetry.battery),
            signal: shade::signal_quality(telemetry.rssi),
            observed_at: Utc::now(),
        }
    }
}

/// Sink for confirmed device state.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn publish(&self, update: TelemetryUpdate) -> Result<()>;
}

/// Device store that logs each update as a JSON line.
pub struct LoggingStore;

#[async_trait]
impl DeviceStore for LoggingStore {
    async fn publish(&self, update: TelemetryUpdate) -> Result<()> {
        match serde_json::to_string(&update) {
            Ok(line) => info!("[Store] {}", line),
            Err(e) => warn!("[Store] Failed to encode update for {}: {}", update.id, e),
        }
        Ok(())
    }
}
