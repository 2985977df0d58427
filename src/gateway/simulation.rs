//! In-memory gateway simulation for development and testing.
//!
//! Stands in for the vendor bridge: a configurable number of shades with
//! positional state, slow battery drain and RSSI jitter. Commands take
//! effect after a short latency and emit a push notification, the same way
//! the real bridge multicasts state changes after a movement.

use super::{DiscoveredShade, GatewayClient, GatewayEvent, ShadeProxy};
use crate::error::Result;
use crate::shade::{DeviceId, ShadeTelemetry};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, interval, sleep};

/// Latency of a simulated vendor round trip.
const ROUND_TRIP: Duration = Duration::from_millis(200);

/// Cadence of unsolicited idle reports while listening.
const IDLE_REPORT_EVERY: Duration = Duration::from_secs(45);

struct ShadeState {
    position: u8,
    battery: f32,
    rssi: i16,
}

/// One simulated shade; doubles as its own proxy.
struct SimulatedShade {
    id: DeviceId,
    state: Mutex<ShadeState>,
    events: mpsc::UnboundedSender<GatewayEvent>,
}

impl SimulatedShade {
    fn telemetry(&self) -> ShadeTelemetry {
        let state = self.state.lock();
        ShadeTelemetry {
            position: state.position,
            battery: state.battery,
            rssi: state.rssi,
        }
    }

    fn jitter_rssi(&self) {
        let mut state = self.state.lock();
        let jitter: i16 = rand::thread_rng().gen_range(-3..=3);
        state.rssi = (state.rssi + jitter).clamp(-98, -40);
    }

    /// Move to a vendor position and multicast the resulting state.
    async fn move_to(&self, position: u8) -> Result<()> {
        sleep(ROUND_TRIP).await;
        {
            let mut state = self.state.lock();
            state.position = position;
            state.battery = (state.battery - 0.1).max(0.0);
        }
        self.jitter_rssi();
        info!("[Sim] {} moved to position {}", self.id, position);

        // The real bridge reports the new state over multicast after a move
        let _ = self.events.send(GatewayEvent {
            id: self.id.clone(),
            telemetry: self.telemetry(),
        });
        Ok(())
    }
}

#[async_trait]
impl ShadeProxy for SimulatedShade {
    async fn refresh(&self) -> Result<ShadeTelemetry> {
        sleep(ROUND_TRIP).await;
        self.jitter_rssi();
        {
            let mut state = self.state.lock();
            state.battery = (state.battery - 0.05).max(0.0);
        }
        debug!("[Sim] {} answered refresh", self.id);
        Ok(self.telemetry())
    }

    async fn open(&self) -> Result<()> {
        self.move_to(0).await
    }

    async fn close(&self) -> Result<()> {
        self.move_to(100).await
    }

    async fn set_position(&self, position: u8) -> Result<()> {
        self.move_to(position.min(100)).await
    }
}

/// Simulated vendor bridge holding a fixed set of shades.
pub struct SimulatedGateway {
    shades: Vec<Arc<SimulatedShade>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<GatewayEvent>>>,
}

impl SimulatedGateway {
    /// Create a gateway with `count` shades at random positions.
    pub fn new(count: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut rng = rand::thread_rng();

        let shades = (0..count)
            .map(|i| {
                Arc::new(SimulatedShade {
                    id: DeviceId::new(format!("02:4e:b0:00:00:{:02x}", i)),
                    state: Mutex::new(ShadeState {
                        position: rng.gen_range(0..=100),
                        battery: rng.gen_range(40.0..100.0),
                        rssi: rng.gen_range(-90..=-50),
                    }),
                    events: tx.clone(),
                })
            })
            .collect();

        Self {
            shades,
            events_rx: Mutex::new(Some(rx)),
        }
    }
}

#[async_trait]
impl GatewayClient for SimulatedGateway {
    async fn discover(&self) -> Result<Vec<DiscoveredShade>> {
        sleep(ROUND_TRIP).await;
        info!("[Sim] Discovery found {} shade(s)", self.shades.len());
        Ok(self
            .shades
            .iter()
            .map(|shade| DiscoveredShade {
                id: shade.id.clone(),
                proxy: shade.clone() as Arc<dyn ShadeProxy>,
            })
            .collect())
    }

    async fn listen(&self, tx: mpsc::Sender<GatewayEvent>) {
        let Some(mut events) = self.events_rx.lock().take() else {
            debug!("[Sim] Listener already running");
            return;
        };

        info!("[Sim] Multicast listener started");
        let mut idle = interval(IDLE_REPORT_EVERY);
        idle.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                _ = idle.tick() => {
                    // Idle drift: an arbitrary shade reports its state
                    if let Some(shade) = self.shades.first() {
                        shade.jitter_rssi();
                        let event = GatewayEvent {
                            id: shade.id.clone(),
                            telemetry: shade.telemetry(),
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        info!("[Sim] Multicast listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discovery_yields_configured_count() {
        let gateway = SimulatedGateway::new(3);
        let shades = gateway.discover().await.unwrap();
        assert_eq!(shades.len(), 3);

        // Identities are stable and unique
        let ids: Vec<_> = shades.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_command_emits_notification() {
        let gateway = SimulatedGateway::new(1);
        let shades = gateway.discover().await.unwrap();
        let shade = &shades[0];

        let (tx, mut rx) = mpsc::channel(8);
        let gateway = Arc::new(gateway);
        let listener = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.listen(tx).await })
        };

        shade.proxy.set_position(60).await.unwrap();

        let event = rx.recv().await.expect("notification after command");
        assert_eq!(event.id, shade.id);
        assert_eq!(event.telemetry.position, 60);

        drop(rx);
        listener.abort();
    }

    #[tokio::test]
    async fn test_refresh_reports_current_position() {
        let gateway = SimulatedGateway::new(1);
        let shades = gateway.discover().await.unwrap();
        let shade = &shades[0];

        shade.proxy.close().await.unwrap();
        let telemetry = shade.proxy.refresh().await.unwrap();
        assert_eq!(telemetry.position, 100);
        assert!(telemetry.rssi >= -98 && telemetry.rssi <= -40);
    }
}
