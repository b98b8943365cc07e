//! Polling wake trigger
//!
//! Stands in for an OS background-wake API: while registered, it probes
//! the server on an interval and raises a wake trigger the first time the
//! server answers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shiftsync_core::{NetworkMonitor, WakeTrigger};
use shiftsync_domain::{Result, SyncTrigger};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::probe::ConnectivityProbe;

struct Armed {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Wake trigger that polls the connectivity probe while armed
pub struct PollingWakeTrigger {
    probe: Arc<ConnectivityProbe>,
    network: Arc<NetworkMonitor>,
    poll_interval: Duration,
    armed: Mutex<Option<Armed>>,
}

impl PollingWakeTrigger {
    pub fn new(
        probe: Arc<ConnectivityProbe>,
        network: Arc<NetworkMonitor>,
        poll_interval: Duration,
    ) -> Self {
        Self { probe, network, poll_interval, armed: Mutex::new(None) }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().as_ref().is_some_and(|armed| !armed.handle.is_finished())
    }

    async fn poll(
        probe: Arc<ConnectivityProbe>,
        network: Arc<NetworkMonitor>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("wake polling cancelled");
                    return;
                }
                () = tokio::time::sleep(poll_interval) => {
                    if probe.check().await {
                        info!("server reachable, waking sync");
                        network.set_online(true);
                        network.request_sync(SyncTrigger::Wake);
                        return;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl WakeTrigger for PollingWakeTrigger {
    async fn register(&self, pending: usize) -> Result<()> {
        let mut armed = self.armed.lock();
        if armed.as_ref().is_some_and(|current| !current.handle.is_finished()) {
            return Ok(());
        }

        debug!(pending, interval_secs = self.poll_interval.as_secs(), "arming wake polling");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::poll(
            Arc::clone(&self.probe),
            Arc::clone(&self.network),
            self.poll_interval,
            cancel.clone(),
        ));
        *armed = Some(Armed { cancel, handle });
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        if let Some(armed) = self.armed.lock().take() {
            armed.cancel.cancel();
            debug!("wake polling disarmed");
        }
        Ok(())
    }
}

impl Drop for PollingWakeTrigger {
    fn drop(&mut self) {
        if let Some(armed) = self.armed.get_mut().take() {
            armed.cancel.cancel();
        }
    }
}
