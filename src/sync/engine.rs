use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use log::info;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time,
};

use crate::{
    market::{Folder, MarketState, Resolution, Symbol, SymbolKey},
    util::AbortOnDropHandle,
};

use super::{
    config::{MarketSyncConfig, MarketSyncControllerConfig, MarketSyncProcessConfig, SyncSettings},
    core::{LineSink, LogLineSink, MarketJob},
    error::{MarketSyncError, Result},
    process::MarketSyncProcess,
    projection::MarketProjection,
    state::{MarketReader, MarketReceiver, MarketStateManager, MarketSyncStatus, MarketUpdate},
};

/// Controller owning one market's state and its synchronization loop.
///
/// While the market is active, the controller repeatedly runs its [`MarketJob`] in an isolated
/// context, feeding it a snapshot of the current [`MarketState`] and replacing that state with
/// the job's result. [`stop`](Self::stop) deactivates the market and cancels the in-flight job,
/// whose output is then discarded. A failing job deactivates the market, without affecting other
/// controllers.
///
/// Dropping the controller aborts its loop.
pub struct MarketSyncController {
    name: String,
    config: MarketSyncControllerConfig,
    process_config: MarketSyncProcessConfig,
    job: Arc<dyn MarketJob>,
    settings: Arc<SyncSettings>,
    sink: Arc<dyn LineSink>,
    handle: Mutex<Option<AbortOnDropHandle<()>>>,
    state_manager: Arc<MarketStateManager>,
}

impl fmt::Debug for MarketSyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketSyncController")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("process_config", &self.process_config)
            .field("settings", &self.settings)
            .field("status", &self.state_manager.status_snapshot())
            .finish_non_exhaustive()
    }
}

impl MarketSyncController {
    /// Creates an idle controller for `state`. Job output lines are forwarded to the `log` facade.
    ///
    /// The market starts inactive, regardless of its persisted `active` flag. Returns an error if
    /// `state` contains duplicate symbols or folders.
    pub fn new(
        config: impl Into<MarketSyncConfig>,
        state: MarketState,
        settings: Arc<SyncSettings>,
        job: Arc<dyn MarketJob>,
    ) -> Result<Arc<Self>> {
        let sink = Arc::new(LogLineSink::new(state.name()));
        Self::new_with_sink(config, state, settings, job, sink)
    }

    /// Creates an idle controller for `state`, sending job output lines to `sink`.
    pub fn new_with_sink(
        config: impl Into<MarketSyncConfig>,
        mut state: MarketState,
        settings: Arc<SyncSettings>,
        job: Arc<dyn MarketJob>,
        sink: Arc<dyn LineSink>,
    ) -> Result<Arc<Self>> {
        let config: MarketSyncConfig = config.into();

        state.validate()?;
        state.set_active(false);

        let (update_tx, _) = broadcast::channel::<MarketUpdate>(config.update_channel_capacity());

        Ok(Arc::new(Self {
            name: state.name().to_string(),
            config: (&config).into(),
            process_config: (&config).into(),
            job,
            settings,
            sink,
            handle: Mutex::new(None),
            state_manager: MarketStateManager::new(state, update_tx),
        }))
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<AbortOnDropHandle<()>>> {
        self.handle
            .lock()
            .expect("`MarketSyncController` mutex can't be poisoned")
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<()>> {
        self.lock_handle().take()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Activates the market and begins the sync loop if it is not already running.
    ///
    /// Calling `start` while the loop is running only keeps the market active.
    pub fn start(&self) {
        let mut handle = self.lock_handle();

        if !self.state_manager.activate() {
            return;
        }

        info!("Market {} sync loop starting", self.name);

        let new_handle = MarketSyncProcess::spawn(
            self.process_config.clone(),
            self.job.clone(),
            self.settings.clone(),
            self.sink.clone(),
            self.state_manager.clone(),
        );

        // A previous loop, if any, already ended
        *handle = Some(new_handle);
    }

    /// Deactivates the market and requests cancellation of the in-flight job, if any.
    ///
    /// Returns immediately. The loop ends once the job exits or is terminated.
    pub fn stop(&self) {
        if self.state_manager.deactivate() {
            info!("Market {} cancellation requested", self.name);
        }
    }

    /// Calls [`start`](Self::start) if `active` is `true`, [`stop`](Self::stop) otherwise.
    pub fn toggle_active(&self, active: bool) {
        if active {
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn active(&self) -> bool {
        self.state_manager.state_snapshot().active()
    }

    /// Returns `true` while the sync loop is running.
    pub fn is_running(&self) -> bool {
        self.state_manager.is_running()
    }

    /// Returns a snapshot of the current market state.
    pub fn state(&self) -> Arc<MarketState> {
        self.state_manager.state_snapshot()
    }

    /// Returns the projection built from the current market state.
    pub fn projection(&self) -> Arc<MarketProjection> {
        self.state_manager.projection_snapshot()
    }

    /// Returns the number of job results applied to the market state so far.
    pub fn generation(&self) -> u64 {
        self.state_manager.generation()
    }

    /// Returns the current [`MarketSyncStatus`] as a snapshot.
    pub fn status_snapshot(&self) -> MarketSyncStatus {
        self.state_manager.status_snapshot()
    }

    /// Creates a new [`MarketReceiver`] for subscribing to market updates.
    pub fn update_receiver(&self) -> MarketReceiver {
        self.state_manager.update_receiver()
    }

    /// Returns a [`MarketReader`] interface for observing the market.
    pub fn reader(&self) -> Arc<dyn MarketReader> {
        self.state_manager.clone()
    }

    /// Waits until the sync loop is not running and returns its final status.
    ///
    /// Returns immediately if the loop is not running.
    pub async fn until_stopped(&self) -> MarketSyncStatus {
        let mut market_rx = self.update_receiver();

        let status = self.status_snapshot();
        if status.is_stopped() {
            return status;
        }

        loop {
            match market_rx.recv().await {
                Ok(market_update) => {
                    if let MarketUpdate::Status(status) = market_update
                        && status.is_stopped()
                    {
                        return status;
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    let status = self.status_snapshot();
                    if status.is_stopped() {
                        return status;
                    }
                }
                Err(RecvError::Closed) => return self.status_snapshot(),
            }
        }
    }

    /// Stops the market and waits for its sync loop to end.
    ///
    /// If the loop does not end within the configured shutdown timeout, it is aborted together
    /// with its in-flight job, and an error is returned.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop();

        let Some(mut handle) = self.try_consume_handle() else {
            return Ok(());
        };

        if handle.is_finished() {
            return Ok(());
        }

        let shutdown_res = tokio::select! {
            join_res = &mut handle => {
                join_res.map_err(MarketSyncError::ProcessTaskJoin)
            }
            _ = time::sleep(self.config.shutdown_timeout()) => {
                Err(MarketSyncError::ShutdownTimeout)
            }
        };

        if matches!(shutdown_res, Err(MarketSyncError::ShutdownTimeout)) {
            handle.abort();

            // Abort only takes effect at the next poll, the loop must be gone before `force_stop`
            let _ = (&mut handle).await;
        }

        if shutdown_res.is_err() {
            self.state_manager.force_stop();
        }

        shutdown_res
    }

    /// Adds `symbol` to the market. Only allowed while the sync loop is not running.
    pub fn add_symbol(&self, symbol: Symbol) -> Result<()> {
        self.state_manager.edit(|state| state.add_symbol(symbol))
    }

    /// Removes the symbol identified by `key`. Only allowed while the sync loop is not running.
    pub fn remove_symbol(&self, key: &SymbolKey) -> Result<Symbol> {
        self.state_manager.edit(|state| state.remove_symbol(key))
    }

    /// Adds a top-level folder. Only allowed while the sync loop is not running.
    pub fn add_folder(&self, folder: Folder) -> Result<()> {
        self.state_manager.edit(|state| state.add_folder(folder))
    }

    /// Removes the top-level folder `name`. Only allowed while the sync loop is not running.
    pub fn remove_folder(&self, name: &str) -> Result<Folder> {
        self.state_manager.edit(|state| state.remove_folder(name))
    }

    pub fn set_resolution(&self, resolution: Resolution) -> Result<()> {
        self.state_manager.edit(|state| {
            state.set_resolution(resolution);
            Ok(())
        })
    }

    pub fn set_from_date(&self, from_date: DateTime<Utc>) -> Result<()> {
        self.state_manager.edit(|state| {
            state.set_from_date(from_date);
            Ok(())
        })
    }
}
