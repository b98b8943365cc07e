//! Background sync worker
//!
//! Owns the task that turns triggers into sync cycles: every network,
//! foreground, explicit or wake trigger raised on the engine's
//! [`NetworkMonitor`](shiftsync_core::NetworkMonitor), plus a periodic timer.
//! Lifecycle follows the usual start/stop contract: one task at a time,
//! cancellation token, bounded join on stop.

use std::sync::Arc;
use std::time::Duration;

use shiftsync_core::SyncEngine;
use shiftsync_domain::{Result, ShiftSyncError, SyncConfig, SyncTrigger};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::probe::ConnectivityProbe;

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for [`SyncWorker`]
#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    /// Periodic cycle interval
    pub interval: Duration,
    /// How long `stop` waits for the loop to exit
    pub shutdown_timeout: Duration,
    /// Run a cycle as soon as the worker starts
    pub run_on_start: bool,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncWorkerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            interval: config.interval(),
            shutdown_timeout: config.shutdown_timeout(),
            run_on_start: true,
        }
    }
}

/// Drives engine cycles from a timer and network triggers
pub struct SyncWorker {
    engine: SyncEngine,
    config: SyncWorkerConfig,
    probe: Option<Arc<ConnectivityProbe>>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl SyncWorker {
    pub fn new(engine: SyncEngine, config: SyncWorkerConfig) -> Self {
        Self {
            engine,
            config,
            probe: None,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Refresh connectivity through `probe` before every timer cycle
    pub fn with_probe(mut self, probe: Arc<ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Recover the queue and spawn the trigger loop
    ///
    /// # Errors
    ///
    /// Returns error if the worker is already running or start-up recovery
    /// fails.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running().await {
            return Err(ShiftSyncError::Config("Sync worker already running".to_string()));
        }
        if self.engine.is_shut_down() {
            return Err(ShiftSyncError::Config("Sync engine is shut down".to_string()));
        }

        info!(interval_secs = self.config.interval.as_secs(), "Starting sync worker");

        let recovered = self.engine.initialize().await?;
        debug!(recovered, "queue recovered");

        self.cancellation_token = CancellationToken::new();

        // Subscribe before spawning so no trigger raised after `start`
        // returns is missed.
        let triggers = self.engine.network().subscribe();
        let engine = self.engine.clone();
        let config = self.config.clone();
        let probe = self.probe.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::trigger_loop(engine, config, probe, triggers, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Sync worker started");
        Ok(())
    }

    /// Cancel the loop and wait for it to finish
    ///
    /// A cycle already in flight completes first.
    ///
    /// # Errors
    ///
    /// Returns error if the worker is not running, the task panicked, or it
    /// did not exit within the shutdown timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running().await {
            return Err(ShiftSyncError::Config("Sync worker not running".to_string()));
        }

        info!("Stopping sync worker");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let timeout = self.config.shutdown_timeout;
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Sync worker task panicked: {}", e);
                    return Err(ShiftSyncError::Internal(format!(
                        "Sync worker task panicked: {e}"
                    )));
                }
                Err(_) => {
                    warn!("Sync worker did not complete within timeout");
                    return Err(ShiftSyncError::Internal(format!(
                        "Sync worker did not stop within {timeout:?}"
                    )));
                }
            }
        }

        info!("Sync worker stopped");
        Ok(())
    }

    /// Stop the loop and shut the engine down
    ///
    /// # Errors
    ///
    /// Propagates [`stop`](Self::stop) failures other than "not running".
    pub async fn shutdown(&mut self) -> Result<()> {
        let stopped = if self.is_running().await { self.stop().await } else { Ok(()) };
        self.engine.shutdown();
        stopped
    }

    pub async fn is_running(&self) -> bool {
        let guard = self.task_handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn trigger_loop(
        engine: SyncEngine,
        config: SyncWorkerConfig,
        probe: Option<Arc<ConnectivityProbe>>,
        mut triggers: broadcast::Receiver<SyncTrigger>,
        cancel: CancellationToken,
    ) {
        if config.run_on_start {
            Self::run_cycle(&engine, SyncTrigger::Startup).await;
        }

        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Sync worker loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Some(probe) = &probe {
                        probe.refresh(engine.network()).await;
                    }
                    Self::run_cycle(&engine, SyncTrigger::Timer).await;
                }
                received = triggers.recv() => match received {
                    Ok(trigger) => Self::run_cycle(&engine, trigger).await,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "trigger receiver lagged");
                        Self::run_cycle(&engine, SyncTrigger::Explicit).await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("trigger channel closed");
                        break;
                    }
                },
            }

            if engine.is_shut_down() {
                debug!("engine shut down, leaving worker loop");
                break;
            }
        }
    }

    async fn run_cycle(engine: &SyncEngine, trigger: SyncTrigger) {
        match engine.run_cycle(trigger).await {
            Ok(Some(report)) => debug!(
                %trigger,
                completed = report.completed,
                failed = report.failed,
                retried = report.retried,
                "worker cycle finished"
            ),
            Ok(None) => debug!(%trigger, "cycle skipped"),
            Err(e) => error!(%trigger, error = %e, "sync cycle failed"),
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
