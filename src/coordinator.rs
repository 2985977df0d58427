//! Staleness-driven update coordinator.
//!
//! Owns one record per discovered shade and reacts to the periodic
//! heartbeat tick: any device silent longer than the configured interval
//! gets a forced refresh, launched as its own task so a slow or failing
//! shade never delays the tick or any other device. Push notifications
//! from the gateway reset a device's staleness and are published directly.
//!
//! Per-device states: Fresh (within the interval), Stale (interval
//! exceeded), RefreshInFlight (one task running). A failed refresh simply
//! leaves the device to go stale again; the next qualifying tick retries.

use crate::command::{self, ShadeCommand};
use crate::error::{BridgeError, Result};
use crate::freshness::FreshnessTracker;
use crate::gateway::{DiscoveredShade, ShadeProxy};
use crate::shade::{DeviceId, ShadeTelemetry};
use crate::store::{DeviceStore, TelemetryUpdate};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;

/// One tracked shade. Exactly one record exists per device for the
/// coordinator's lifetime; the map never changes after discovery.
struct DeviceRecord {
    id: DeviceId,
    proxy: Arc<dyn ShadeProxy>,
    freshness: FreshnessTracker,
    /// At most one refresh task per device; the tick path claims this flag
    /// before spawning and the task releases it when done.
    refresh_in_flight: AtomicBool,
}

/// Coordinates per-device staleness checks, refresh tasks, notification
/// ingestion and command dispatch.
pub struct UpdateCoordinator {
    devices: HashMap<DeviceId, Arc<DeviceRecord>>,
    store: Arc<dyn DeviceStore>,
    stale_after: Duration,
    refresh_tasks: TaskTracker,
}

impl UpdateCoordinator {
    /// Build the device map from startup discovery results.
    pub fn new(
        discovered: Vec<DiscoveredShade>,
        store: Arc<dyn DeviceStore>,
        stale_after: Duration,
    ) -> Self {
        let devices = discovered
            .into_iter()
            .map(|shade| {
                let record = Arc::new(DeviceRecord {
                    id: shade.id.clone(),
                    proxy: shade.proxy,
                    freshness: FreshnessTracker::new(),
                    refresh_in_flight: AtomicBool::new(false),
                });
                (shade.id, record)
            })
            .collect();

        Self {
            devices,
            store,
            stale_after,
            refresh_tasks: TaskTracker::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.devices.keys()
    }

    /// Heartbeat handler. Non-blocking: checks every record and spawns a
    /// refresh task for each stale one, never waiting on any of them.
    pub fn on_tick(&self, now: Instant) {
        for record in self.devices.values() {
            if !record.freshness.should_refresh(now, self.stale_after) {
                continue;
            }

            // Claim the per-device slot; lose the race means a refresh is
            // already running and this tick leaves the device alone.
            if record
                .refresh_in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                debug!("[Coord] {} refresh already in flight, skipping", record.id);
                continue;
            }

            record.freshness.mark_refresh_started(now);
            debug!("[Coord] {} stale, requesting refresh", record.id);

            let record = record.clone();
            let store = self.store.clone();
            self.refresh_tasks.spawn(async move {
                match record.proxy.refresh().await {
                    Ok(telemetry) => {
                        publish(&*store, &record.id, &telemetry).await;
                    }
                    Err(e) => {
                        // Not fatal: the device goes stale again after the
                        // interval and the next tick retries.
                        warn!("[Coord] Refresh failed for {}: {}", record.id, e);
                    }
                }
                record.refresh_in_flight.store(false, Ordering::Release);
            });
        }
    }

    /// Ingest an unsolicited state report from the gateway listener.
    ///
    /// Unknown identities are logged and dropped: either a race with
    /// discovery or a stray multicast message, not an error state.
    pub async fn on_notification(&self, id: &DeviceId, telemetry: ShadeTelemetry) {
        let Some(record) = self.devices.get(id) else {
            warn!("[Coord] Notification for unknown device {}, ignoring", id);
            return;
        };

        record.freshness.mark_notified(Instant::now());
        publish(&*self.store, &record.id, &telemetry).await;
    }

    /// Forward a host command to the device's proxy.
    ///
    /// Commands bypass the freshness machinery, but a record whose updates
    /// were disabled (shutdown initiated) rejects them explicitly so the
    /// failure is visible to the issuer.
    pub async fn dispatch_command(&self, id: &DeviceId, command: ShadeCommand) -> Result<()> {
        let record = self
            .devices
            .get(id)
            .ok_or_else(|| BridgeError::UnknownDevice(id.clone()))?;

        if !record.freshness.is_enabled() {
            return Err(BridgeError::DeviceUnavailable(id.clone()));
        }

        info!("[Coord] Dispatching {} to {}", command, id);
        command::route(&*record.proxy, command).await
    }

    /// Graceful teardown: disable every record first so no further
    /// refreshes are scheduled, then wait for all in-flight refresh tasks.
    ///
    /// No deadline is imposed here; the wait is bounded by the vendor
    /// proxies' own request timeouts.
    pub async fn shutdown(&self) {
        for record in self.devices.values() {
            record.freshness.disable();
        }
        self.refresh_tasks.close();
        self.refresh_tasks.wait().await;
        info!("[Coord] All refresh tasks finished");
    }
}

async fn publish(store: &dyn DeviceStore, id: &DeviceId, telemetry: &ShadeTelemetry) {
    let update = TelemetryUpdate::from_telemetry(id.clone(), telemetry);
    if let Err(e) = store.publish(update).await {
        warn!("[Coord] Failed to publish update for {}: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    const STALE_AFTER: Duration = Duration::from_secs(60);

    /// Proxy whose refresh blocks until released, counting calls.
    struct GatedProxy {
        refresh_calls: AtomicUsize,
        gate: Notify,
        fail: bool,
    }

    impl GatedProxy {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                refresh_calls: AtomicUsize::new(0),
                gate: Notify::new(),
                fail,
            })
        }

        fn release(&self) {
            self.gate.notify_waiters();
        }

        fn calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ShadeProxy for GatedProxy {
        async fn refresh(&self) -> Result<ShadeTelemetry> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if self.fail {
                Err(BridgeError::Gateway("simulated timeout".into()))
            } else {
                Ok(ShadeTelemetry {
                    position: 40,
                    battery: 80.0,
                    rssi: -60,
                })
            }
        }

        async fn open(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        async fn set_position(&self, _position: u8) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CapturingStore {
        updates: Mutex<Vec<TelemetryUpdate>>,
    }

    #[async_trait]
    impl DeviceStore for CapturingStore {
        async fn publish(&self, update: TelemetryUpdate) -> Result<()> {
            self.updates.lock().push(update);
            Ok(())
        }
    }

    fn coordinator_with(
        proxy: Arc<GatedProxy>,
    ) -> (UpdateCoordinator, Arc<CapturingStore>, DeviceId) {
        let id = DeviceId::from("00:11:22:33");
        let store = Arc::new(CapturingStore::default());
        let discovered = vec![DiscoveredShade {
            id: id.clone(),
            proxy: proxy as Arc<dyn ShadeProxy>,
        }];
        let coordinator = UpdateCoordinator::new(discovered, store.clone(), STALE_AFTER);
        (coordinator, store, id)
    }

    /// Lets spawned refresh tasks reach their first await point.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_first_tick_refreshes_never_seen_device() {
        let proxy = GatedProxy::new(false);
        let (coordinator, store, _id) = coordinator_with(proxy.clone());

        coordinator.on_tick(Instant::now());
        settle().await;
        assert_eq!(proxy.calls(), 1);

        proxy.release();
        settle().await;
        assert_eq!(store.updates.lock().len(), 1);
        assert_eq!(store.updates.lock()[0].level, 60);
    }

    #[tokio::test]
    async fn test_second_tick_does_not_stack_refreshes() {
        let proxy = GatedProxy::new(false);
        let (coordinator, _store, _id) = coordinator_with(proxy.clone());

        let start = Instant::now();
        coordinator.on_tick(start);
        settle().await;

        // Another tick past the interval while the first refresh is still
        // blocked: the in-flight slot is taken, nothing new launches.
        coordinator.on_tick(start + STALE_AFTER + Duration::from_secs(1));
        settle().await;
        assert_eq!(proxy.calls(), 1);

        proxy.release();
        settle().await;

        // After completion the optimistic reset keeps the device fresh
        // until the interval elapses again.
        coordinator.on_tick(start + Duration::from_secs(30));
        settle().await;
        assert_eq!(proxy.calls(), 1);

        coordinator.on_tick(start + STALE_AFTER + Duration::from_secs(1));
        settle().await;
        assert_eq!(proxy.calls(), 2);
        proxy.release();
    }

    #[tokio::test]
    async fn test_failed_refresh_publishes_nothing_and_retries_later() {
        let proxy = GatedProxy::new(true);
        let (coordinator, store, _id) = coordinator_with(proxy.clone());

        let start = Instant::now();
        coordinator.on_tick(start);
        settle().await;
        proxy.release();
        settle().await;

        assert_eq!(proxy.calls(), 1);
        assert!(store.updates.lock().is_empty());

        // Re-qualifies once the interval elapses again after the failure
        coordinator.on_tick(start + STALE_AFTER + Duration::from_secs(1));
        settle().await;
        assert_eq!(proxy.calls(), 2);
        proxy.release();
    }

    #[tokio::test]
    async fn test_notification_resets_staleness_mid_refresh() {
        let proxy = GatedProxy::new(false);
        let (coordinator, store, id) = coordinator_with(proxy.clone());

        let start = Instant::now();
        coordinator.on_tick(start);
        settle().await;

        coordinator
            .on_notification(
                &id,
                ShadeTelemetry {
                    position: 0,
                    battery: 90.0,
                    rssi: -45,
                },
            )
            .await;
        assert_eq!(store.updates.lock().len(), 1);
        assert_eq!(store.updates.lock()[0].level, 100);

        proxy.release();
        settle().await;

        // The notification kept the device fresh; ticks within its interval
        // launch nothing even though the refresh slot is free again.
        coordinator.on_tick(start + STALE_AFTER - Duration::from_secs(1));
        settle().await;
        assert_eq!(proxy.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_notification_is_ignored() {
        let proxy = GatedProxy::new(false);
        let (coordinator, store, _id) = coordinator_with(proxy);

        coordinator
            .on_notification(
                &DeviceId::from("ff:ff:ff:ff"),
                ShadeTelemetry {
                    position: 50,
                    battery: 50.0,
                    rssi: -60,
                },
            )
            .await;

        assert!(store.updates.lock().is_empty());
        assert_eq!(coordinator.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_command_unknown_device() {
        let proxy = GatedProxy::new(false);
        let (coordinator, _store, _id) = coordinator_with(proxy);

        let err = coordinator
            .dispatch_command(&DeviceId::from("ff:ff:ff:ff"), ShadeCommand::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownDevice(_)));
    }

    #[tokio::test]
    async fn test_dispatch_command_after_shutdown_is_rejected() {
        let proxy = GatedProxy::new(false);
        let (coordinator, _store, id) = coordinator_with(proxy);

        coordinator.shutdown().await;

        let err = coordinator
            .dispatch_command(&id, ShadeCommand::Close)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::DeviceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_refresh() {
        let proxy = GatedProxy::new(false);
        let (coordinator, _store, _id) = coordinator_with(proxy.clone());

        coordinator.on_tick(Instant::now());
        settle().await;
        assert_eq!(proxy.calls(), 1);

        let mut shutdown = tokio_test::task::spawn(coordinator.shutdown());
        assert!(shutdown.poll().is_pending());

        proxy.release();
        settle().await;
        assert!(shutdown.poll().is_ready());
    }

    #[tokio::test]
    async fn test_no_refresh_scheduled_after_shutdown() {
        let proxy = GatedProxy::new(false);
        let (coordinator, _store, _id) = coordinator_with(proxy.clone());

        coordinator.shutdown().await;
        coordinator.on_tick(Instant::now() + STALE_AFTER * 2);
        settle().await;
        assert_eq!(proxy.calls(), 0);
    }
}
