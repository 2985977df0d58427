//! Shade device model and vendor/host value mapping.
//!
//! The vendor reports positions where 0 = fully open and 100 = fully closed;
//! the host convention is the complement. Signal strength arrives as a raw
//! RSSI measurement and is quantized into the host's 0-10 quality scale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable unique key for a physical shade (the vendor MAC).
///
/// Correlates host device-store entries with gateway proxies across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(mac: impl Into<String>) -> Self {
        Self(mac.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(mac: &str) -> Self {
        Self(mac.to_string())
    }
}

/// Raw readings as decoded by the vendor gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadeTelemetry {
    /// Vendor position: 0 = fully open, 100 = fully closed.
    pub position: u8,
    /// Battery percentage as reported by the shade motor.
    pub battery: f32,
    /// Signal strength in dBm (negative, higher = stronger).
    pub rssi: i16,
}

/// Three-state classification of a shade, independent of the numeric level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShadeStatus {
    Open,
    Closed,
    PartiallyOpen,
}

impl ShadeStatus {
    /// Classify a raw vendor position: 100 is closed, 0 is open,
    /// anything in between is partially open.
    pub fn from_position(position: u8) -> Self {
        if position >= 100 {
            ShadeStatus::Closed
        } else if position == 0 {
            ShadeStatus::Open
        } else {
            ShadeStatus::PartiallyOpen
        }
    }
}

/// Convert a vendor position to the host-facing level (complement).
pub fn host_level(position: u8) -> u8 {
    100 - position.min(100)
}

/// Convert a host level to the vendor position (same complement).
pub fn vendor_position(level: u8) -> u8 {
    100 - level.min(100)
}

/// Quantize an RSSI measurement into the host's 0-10 signal quality scale.
///
/// Linear quantization between the -98 dBm floor and the -50 dBm ceiling.
pub fn signal_quality(rssi: i16) -> u8 {
    if rssi > -50 {
        10
    } else if rssi < -98 {
        0
    } else {
        (((rssi + 97) as f32 / 5.0).floor() as i16 + 1).clamp(0, 10) as u8
    }
}

/// Battery percentage as published to the host: clamped and truncated.
pub fn battery_percent(battery: f32) -> u8 {
    battery.clamp(0.0, 100.0) as u8
}
