//! Vendor gateway seam.
//!
//! The bridge hardware and its RF/HTTP protocol live behind these traits:
//! a [`GatewayClient`] discovers shades and pumps unsolicited state reports
//! into a channel, and each shade is driven through a [`ShadeProxy`]. The
//! coordinator never sees the wire protocol.

pub mod simulation;

use crate::error::Result;
use crate::shade::{DeviceId, ShadeTelemetry};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Unsolicited state-change report pushed by the gateway (multicast path).
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub id: DeviceId,
    pub telemetry: ShadeTelemetry,
}

/// A shade discovered on the gateway, paired with its control proxy.
pub struct DiscoveredShade {
    pub id: DeviceId,
    pub proxy: Arc<dyn ShadeProxy>,
}

/// Opaque handle to one physical shade.
///
/// `refresh` is a vendor-protocol round trip: it may take seconds and may
/// fail, and the vendor library owns its own timeout. Movement commands use
/// vendor coordinates (0 = fully open, 100 = fully closed).
#[async_trait]
pub trait ShadeProxy: Send + Sync {
    /// Request current telemetry from the device even absent a state change.
    async fn refresh(&self) -> Result<ShadeTelemetry>;

    async fn open(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    /// Move to a vendor position (0 = fully open, 100 = fully closed).
    async fn set_position(&self, position: u8) -> Result<()>;
}

/// Connection to the vendor WiFi/433MHz bridge.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Enumerate the shades known to the bridge.
    ///
    /// Fatal at startup when it fails or returns no devices; the bridge
    /// does not run partially.
    async fn discover(&self) -> Result<Vec<DiscoveredShade>>;

    /// Forward unsolicited state reports into `tx` until the receiver is
    /// dropped. The multicast listener seam; runs as its own task.
    async fn listen(&self, tx: mpsc::Sender<GatewayEvent>);
}
